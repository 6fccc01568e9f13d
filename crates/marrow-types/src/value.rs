use std::fmt;

use crate::error::{FfiError, FfiResult};

/// A raw native address. Address 0 is the canonical NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(usize);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(raw: usize) -> Self {
        Address(raw)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Address(ptr as usize)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }

    /// Address arithmetic, wrapping like C pointer arithmetic on an integer.
    pub fn offset(self, delta: i64) -> Self {
        Address((self.0 as i64).wrapping_add(delta) as usize)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Host-level value exchanged with the marshalling strategies.
///
/// This is the boundary with the hosting interpreter: strategies read native
/// bytes into a `Value` and coerce a `Value` back into native bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// A non-owning pointer value.
    Pointer(Address),
}

impl Value {
    /// Everything except `Nil` and `false` is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Conversion to an integer (`to_i`): floats truncate toward zero,
    /// unsigned values keep their bit pattern.
    pub fn coerce_int(&self) -> FfiResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::UInt(n) => Ok(*n as i64),
            Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Value::Bool(b) => Ok(*b as i64),
            Value::Str(s) => s.trim().parse::<i64>().map_err(|_| self.conversion_error("Integer")),
            _ => Err(self.conversion_error("Integer")),
        }
    }

    /// Like [`Value::coerce_int`] but yields the unsigned bit pattern.
    pub fn coerce_uint(&self) -> FfiResult<u64> {
        match self {
            Value::UInt(n) => Ok(*n),
            Value::Str(s) => match s.trim().parse::<u64>() {
                Ok(n) => Ok(n),
                Err(_) => self.coerce_int().map(|n| n as u64),
            },
            _ => self.coerce_int().map(|n| n as u64),
        }
    }

    pub fn coerce_float(&self) -> FfiResult<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            Value::UInt(n) => Ok(*n as f64),
            _ => Err(self.conversion_error("Float")),
        }
    }

    /// Conversion to a string (`to_s`).
    pub fn coerce_str(&self) -> FfiResult<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Nil => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::UInt(n) => Ok(n.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Pointer(_) => Err(self.conversion_error("String")),
        }
    }

    /// Conversion to a native address. `Nil` is the NULL pointer; integers are
    /// taken as raw addresses.
    pub fn coerce_pointer(&self) -> FfiResult<Address> {
        match self {
            Value::Pointer(addr) => Ok(*addr),
            Value::Nil => Ok(Address::NULL),
            Value::UInt(n) => Ok(Address::new(*n as usize)),
            Value::Int(n) if *n >= 0 => Ok(Address::new(*n as usize)),
            _ => Err(self.conversion_error("Pointer")),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Pointer(_) => "pointer",
        }
    }

    fn conversion_error(&self, target: &'static str) -> FfiError {
        FfiError::Conversion { value: self.to_string(), target }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Pointer(addr) => write!(f, "#<Pointer address={addr}>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Address> for Value {
    fn from(addr: Address) -> Self {
        Value::Pointer(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_coerces_to_null_pointer() {
        assert_eq!(Value::Nil.coerce_pointer().unwrap(), Address::NULL);
        assert!(Value::Nil.coerce_pointer().unwrap().is_null());
    }

    #[test]
    fn float_truncates_when_coerced_to_int() {
        assert_eq!(Value::Float(-3.9).coerce_int().unwrap(), -3);
        assert!(Value::Float(f64::NAN).coerce_int().is_err());
    }

    #[test]
    fn pointer_does_not_coerce_to_string() {
        let err = Value::Pointer(Address::new(16)).coerce_str().unwrap_err();
        assert!(matches!(err, FfiError::Conversion { target: "String", .. }));
    }

    #[test]
    fn address_offset_wraps_both_ways() {
        let base = Address::new(0x1000);
        assert_eq!(base.offset(8).raw(), 0x1008);
        assert_eq!(base.offset(-16).raw(), 0x0ff0);
    }
}
