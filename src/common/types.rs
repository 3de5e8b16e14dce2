//! Resolved type handles and the class hierarchy oracle
//!
//! Both are produced by the binding resolver; the core only consumes them.

use crate::consts::{ERROR, EXCEPTION, OBJECT, RUNTIME_EXCEPTION, THROWABLE};
use rustc_hash::FxHashMap;
use std::fmt;

/// A resolved type. Class names are internal names (`java/lang/String`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Null,
    Class(String),
    Array(Box<Type>),
}

/// Operand category used to pick load/store/return/arith opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Void,
}

impl Type {
    pub fn class(name: impl Into<String>) -> Self {
        Type::Class(name.into())
    }

    pub fn string() -> Self {
        Type::Class(crate::consts::STRING.to_string())
    }

    pub fn type_code(&self) -> TypeCode {
        match self {
            Type::Void => TypeCode::Void,
            Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int => TypeCode::Int,
            Type::Long => TypeCode::Long,
            Type::Float => TypeCode::Float,
            Type::Double => TypeCode::Double,
            Type::Null | Type::Class(_) | Type::Array(_) => TypeCode::Reference,
        }
    }

    /// Number of stack/local slots a value of this type occupies
    pub fn width(&self) -> u16 {
        match self.type_code() {
            TypeCode::Void => 0,
            TypeCode::Long | TypeCode::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.type_code() == TypeCode::Reference
    }

    /// Types a classic int switch can dispatch on
    pub fn is_int_switchable(&self) -> bool {
        matches!(self, Type::Byte | Type::Char | Type::Short | Type::Int)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Field/method descriptor form
    pub fn descriptor(&self) -> String {
        match self {
            Type::Void => "V".into(),
            Type::Boolean => "Z".into(),
            Type::Byte => "B".into(),
            Type::Char => "C".into(),
            Type::Short => "S".into(),
            Type::Int => "I".into(),
            Type::Long => "J".into(),
            Type::Float => "F".into(),
            Type::Double => "D".into(),
            Type::Null => format!("L{};", OBJECT),
            Type::Class(name) => format!("L{};", name),
            Type::Array(elem) => format!("[{}", elem.descriptor()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Boolean => write!(f, "boolean"),
            Type::Byte => write!(f, "byte"),
            Type::Char => write!(f, "char"),
            Type::Short => write!(f, "short"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Null => write!(f, "null"),
            Type::Class(name) => write!(f, "{}", name.replace('/', ".")),
            Type::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

/// Subtyping facts the analysis needs about classes.
pub trait ClassHierarchy {
    /// Reflexive subclass test on internal names
    fn is_subclass(&self, sub: &str, sup: &str) -> bool;

    /// Unchecked throwables need not be declared or caught
    fn is_unchecked(&self, class: &str) -> bool {
        self.is_subclass(class, RUNTIME_EXCEPTION) || self.is_subclass(class, ERROR)
    }
}

/// Superclass table, enough to answer [`ClassHierarchy`] queries
#[derive(Debug, Clone)]
pub struct ClassTable {
    supers: FxHashMap<String, String>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self {
            supers: FxHashMap::default(),
        }
    }

    /// Table preloaded with the throwable roots of `java.lang`
    pub fn with_java_lang() -> Self {
        let mut table = Self::new();
        table.add(THROWABLE, OBJECT);
        table.add(EXCEPTION, THROWABLE);
        table.add(ERROR, THROWABLE);
        table.add(RUNTIME_EXCEPTION, EXCEPTION);
        table.add(crate::consts::ASSERTION_ERROR, ERROR);
        table.add(crate::consts::STRING, OBJECT);
        table
    }

    pub fn add(&mut self, class: impl Into<String>, superclass: impl Into<String>) -> &mut Self {
        self.supers.insert(class.into(), superclass.into());
        self
    }

    pub fn superclass(&self, class: &str) -> Option<&str> {
        self.supers.get(class).map(|s| s.as_str())
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::with_java_lang()
    }
}

impl ClassHierarchy for ClassTable {
    fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        if sup == OBJECT {
            return true;
        }
        let mut current = Some(sub);
        while let Some(class) = current {
            if class == sup {
                return true;
            }
            current = self.superclass(class);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throwable_roots() {
        let mut table = ClassTable::with_java_lang();
        table.add("java/io/IOException", EXCEPTION);
        table.add("java/lang/IllegalStateException", RUNTIME_EXCEPTION);

        assert!(table.is_subclass("java/io/IOException", THROWABLE));
        assert!(!table.is_unchecked("java/io/IOException"));
        assert!(table.is_unchecked("java/lang/IllegalStateException"));
        assert!(table.is_unchecked(ERROR));
        assert!(!table.is_subclass(EXCEPTION, RUNTIME_EXCEPTION));
    }

    #[test]
    fn descriptors_and_widths() {
        assert_eq!(Type::Long.width(), 2);
        assert_eq!(Type::Boolean.type_code(), TypeCode::Int);
        assert_eq!(Type::Array(Box::new(Type::Int)).descriptor(), "[I");
        assert_eq!(Type::string().descriptor(), "Ljava/lang/String;");
    }
}
