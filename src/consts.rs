// Well-known java.lang internal names the core emits references to

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";
pub const THROWABLE: &str = "java/lang/Throwable";
pub const EXCEPTION: &str = "java/lang/Exception";
pub const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
pub const ERROR: &str = "java/lang/Error";
pub const ASSERTION_ERROR: &str = "java/lang/AssertionError";

// Synthetic class flag read by compiled `assert` statements
pub const ASSERTIONS_DISABLED: &str = "$assertionsDisabled";

// Prefix of the message thrown by problem methods and types
pub const PROBLEM_PREFIX: &str = "Unresolved compilation problem: ";

// Class-file limits
pub const MAX_CODE_SIZE: usize = 65_535;
pub const MAX_POOL_ENTRIES: usize = 65_535;

// First class-file major version that rejects jsr/ret (Java 6)
pub const JSR_FORBIDDEN_MAJOR: u16 = 50;

/// A compile-time constant value attached to an expression by the binding resolver
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(u16),
    String(String),
}

impl Constant {
    /// Value usable as an int switch key
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Constant::Int(v) => Some(*v),
            Constant::Char(c) => Some(*c as i32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}L", v),
            Constant::Float(v) => write!(f, "{}f", v),
            Constant::Double(v) => write!(f, "{}", v),
            Constant::Boolean(v) => write!(f, "{}", v),
            Constant::Char(c) => match char::from_u32(*c as u32) {
                Some(ch) => write!(f, "'{}'", ch),
                None => write!(f, "'\\u{:04x}'", c),
            },
            Constant::String(s) => write!(f, "\"{}\"", s),
        }
    }
}
