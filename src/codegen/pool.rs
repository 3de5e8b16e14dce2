//! Constant pool sink
//!
//! Emission only needs pool indices. [`PoolSink`] is the seam to whatever
//! writes the class file; [`ConstantPool`] is an interning implementation
//! that also backs the disassembler.

use crate::common::{Error, Result};
use crate::consts::MAX_POOL_ENTRIES;
use rustc_hash::FxHashMap;
use std::fmt;

/// A pool entry. Floating-point values are kept as raw bits so entries can
/// be hashed and NaN payloads survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

impl PoolEntry {
    /// Long and double entries take two indices
    pub fn width(&self) -> u16 {
        match self {
            PoolEntry::Long(_) | PoolEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Where emission puts its constants
pub trait PoolSink {
    fn class(&mut self, name: &str) -> Result<u16>;
    fn string(&mut self, value: &str) -> Result<u16>;
    fn integer(&mut self, value: i32) -> Result<u16>;
    fn float(&mut self, value: f32) -> Result<u16>;
    fn long(&mut self, value: i64) -> Result<u16>;
    fn double(&mut self, value: f64) -> Result<u16>;
    fn field(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16>;
    fn method(&mut self, owner: &str, name: &str, descriptor: &str, interface: bool) -> Result<u16>;
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// Slot 0 is unused; the second slot of a wide entry is `None`
    entries: Vec<Option<PoolEntry>>,
    lookup: FxHashMap<PoolEntry, u16>,
    limit: usize,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::with_limit(MAX_POOL_ENTRIES)
    }

    /// Pool that overflows once `limit` indices are in use
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: vec![None],
            lookup: FxHashMap::default(),
            limit,
        }
    }

    /// Number of indices in use, slot 0 included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn get(&self, index: u16) -> Option<&PoolEntry> {
        self.entries.get(index as usize).and_then(Option::as_ref)
    }

    fn intern(&mut self, entry: PoolEntry) -> Result<u16> {
        if let Some(index) = self.lookup.get(&entry) {
            return Ok(*index);
        }
        let width = entry.width() as usize;
        if self.entries.len() + width > self.limit {
            return Err(Error::PoolOverflow);
        }
        let index = self.entries.len() as u16;
        self.entries.push(Some(entry.clone()));
        if width == 2 {
            self.entries.push(None);
        }
        self.lookup.insert(entry, index);
        Ok(index)
    }

    fn utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(PoolEntry::Utf8(value.to_string()))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(PoolEntry::NameAndType(name, descriptor))
    }

    fn text(&self, index: u16) -> String {
        match self.get(index) {
            Some(PoolEntry::Utf8(s)) => s.clone(),
            _ => format!("#{}", index),
        }
    }

    /// Human-readable rendering of an entry, as the disassembler prints it
    pub fn describe(&self, index: u16) -> String {
        match self.get(index) {
            None => format!("#{}", index),
            Some(entry) => match entry {
                PoolEntry::Utf8(s) => s.clone(),
                PoolEntry::Integer(v) => v.to_string(),
                PoolEntry::Float(bits) => format!("{}f", f32::from_bits(*bits)),
                PoolEntry::Long(v) => format!("{}L", v),
                PoolEntry::Double(bits) => f64::from_bits(*bits).to_string(),
                PoolEntry::Class(name) => self.text(*name),
                PoolEntry::String(value) => format!("\"{}\"", self.text(*value)),
                PoolEntry::NameAndType(name, desc) => format!("{}:{}", self.text(*name), self.text(*desc)),
                PoolEntry::FieldRef(class, nat)
                | PoolEntry::MethodRef(class, nat)
                | PoolEntry::InterfaceMethodRef(class, nat) => {
                    format!("{}.{}", self.describe(*class), self.describe(*nat))
                }
            },
        }
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolSink for ConstantPool {
    fn class(&mut self, name: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        self.intern(PoolEntry::Class(name))
    }

    fn string(&mut self, value: &str) -> Result<u16> {
        let value = self.utf8(value)?;
        self.intern(PoolEntry::String(value))
    }

    fn integer(&mut self, value: i32) -> Result<u16> {
        self.intern(PoolEntry::Integer(value))
    }

    fn float(&mut self, value: f32) -> Result<u16> {
        self.intern(PoolEntry::Float(value.to_bits()))
    }

    fn long(&mut self, value: i64) -> Result<u16> {
        self.intern(PoolEntry::Long(value))
    }

    fn double(&mut self, value: f64) -> Result<u16> {
        self.intern(PoolEntry::Double(value.to_bits()))
    }

    fn field(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.intern(PoolEntry::FieldRef(class, nat))
    }

    fn method(&mut self, owner: &str, name: &str, descriptor: &str, interface: bool) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        if interface {
            self.intern(PoolEntry::InterfaceMethodRef(class, nat))
        } else {
            self.intern(PoolEntry::MethodRef(class, nat))
        }
    }
}

impl fmt::Display for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                writeln!(f, "#{} = {:?}", index, entry)?;
            }
        }
        Ok(())
    }
}
