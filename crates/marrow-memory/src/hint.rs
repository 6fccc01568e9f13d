use marrow_types::{FfiError, FfiResult, TypeDescriptor, Value};

use crate::region::accessor_type;

/// What an allocation request says about the size of one element.
#[derive(Debug, Clone)]
pub enum TypeHint {
    /// A type name such as `:int32` or `uchar`.
    Name(String),
    /// A raw element size in bytes.
    Bytes(usize),
    /// An already resolved descriptor.
    Type(TypeDescriptor),
    /// A struct, sized by its computed layout.
    Struct { name: String, size: usize },
    /// Anything else the host passed; only strings and non-negative
    /// integers are usable.
    Value(Value),
}

impl TypeHint {
    /// Byte size of one element, and the element type when the hint names one.
    pub fn resolve(&self) -> FfiResult<(usize, Option<TypeDescriptor>)> {
        match self {
            TypeHint::Name(name) => {
                let ty = accessor_type(name)?;
                Ok((ty.size(), Some(ty)))
            }
            TypeHint::Bytes(size) => Ok((*size, None)),
            TypeHint::Type(ty) => Ok((ty.size(), Some(ty.clone()))),
            TypeHint::Struct { size, .. } => Ok((*size, None)),
            TypeHint::Value(Value::Str(name)) => TypeHint::Name(name.clone()).resolve(),
            TypeHint::Value(Value::Int(size)) if *size >= 0 => Ok((*size as usize, None)),
            TypeHint::Value(Value::UInt(size)) => Ok((*size as usize, None)),
            TypeHint::Value(other) => Err(FfiError::InvalidTypeHint(other.to_string())),
        }
    }
}

impl From<&str> for TypeHint {
    fn from(name: &str) -> Self {
        TypeHint::Name(name.to_string())
    }
}

impl From<usize> for TypeHint {
    fn from(size: usize) -> Self {
        TypeHint::Bytes(size)
    }
}

impl From<TypeDescriptor> for TypeHint {
    fn from(ty: TypeDescriptor) -> Self {
        TypeHint::Type(ty)
    }
}

impl From<Value> for TypeHint {
    fn from(value: Value) -> Self {
        TypeHint::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_resolve_to_element_sizes() {
        assert_eq!(TypeHint::from("int16").resolve().unwrap().0, 2);
        assert_eq!(TypeHint::from("ulong_long").resolve().unwrap().0, 8);
        assert_eq!(TypeHint::from(12usize).resolve().unwrap().0, 12);
        assert_eq!(TypeHint::Struct { name: "Point".into(), size: 16 }.resolve().unwrap().0, 16);
        assert_eq!(TypeHint::from(Value::from("double")).resolve().unwrap().0, 8);
        assert_eq!(TypeHint::from(Value::Int(3)).resolve().unwrap().0, 3);
    }

    #[test]
    fn other_values_are_invalid_hints() {
        for value in [Value::Float(1.5), Value::Nil, Value::Int(-1), Value::Bool(true)] {
            assert!(matches!(
                TypeHint::from(value).resolve(),
                Err(FfiError::InvalidTypeHint(_))
            ));
        }
    }
}
