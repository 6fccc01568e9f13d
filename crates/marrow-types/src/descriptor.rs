use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::abi::AbiTag;
use crate::error::FfiResult;
use crate::mapped::DataConverter;
use crate::strategy::MarshalStrategy;
use crate::value::Value;

/// What a descriptor describes beyond its storage.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A catalog primitive.
    Builtin,
    /// A user conversion over a delegate type.
    Mapped,
    /// `length` consecutive elements of `element`.
    Array { element: TypeDescriptor, length: usize },
    /// Sized storage with no scalar strategy (struct-by-value placeholders).
    Opaque,
}

struct TypeInner {
    name: String,
    /// `None` for the unsized VOID sentinel.
    size: Option<usize>,
    alignment: usize,
    abi: AbiTag,
    strategy: MarshalStrategy,
    kind: TypeKind,
}

/// Immutable native type description. Cloning shares the same descriptor.
///
/// Two descriptors are equal when their names are equal; a mapped type
/// carries its native type's name.
#[derive(Clone)]
pub struct TypeDescriptor(Arc<TypeInner>);

impl TypeDescriptor {
    pub(crate) fn builtin(
        name: &str,
        size: Option<usize>,
        alignment: usize,
        abi: AbiTag,
        strategy: MarshalStrategy,
    ) -> Self {
        TypeDescriptor(Arc::new(TypeInner {
            name: name.to_string(),
            size,
            alignment,
            abi,
            strategy,
            kind: TypeKind::Builtin,
        }))
    }

    pub(crate) fn mapped(converter: DataConverter, delegate: TypeDescriptor) -> Self {
        TypeDescriptor(Arc::new(TypeInner {
            name: delegate.name().to_string(),
            size: delegate.0.size,
            alignment: delegate.alignment(),
            abi: delegate.abi(),
            strategy: MarshalStrategy::Mapped { converter, delegate: delegate.clone() },
            kind: TypeKind::Mapped,
        }))
    }

    /// A fixed-length repetition of `element`.
    pub fn array(element: TypeDescriptor, length: usize) -> Self {
        TypeDescriptor(Arc::new(TypeInner {
            name: format!("{}[{}]", element.name(), length),
            // Saturates: an oversized array never fits a region or layout.
            size: Some(element.size().saturating_mul(length)),
            alignment: element.alignment(),
            abi: element.abi(),
            strategy: element.strategy().clone(),
            kind: TypeKind::Array { element, length },
        }))
    }

    /// Sized storage passed to the native layer as the void placeholder.
    pub fn opaque(name: &str, size: usize, alignment: usize) -> Self {
        TypeDescriptor(Arc::new(TypeInner {
            name: name.to_string(),
            size: Some(size),
            alignment,
            abi: AbiTag::Void,
            strategy: MarshalStrategy::Void,
            kind: TypeKind::Opaque,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Byte size; 0 for the unsized VOID sentinel.
    pub fn size(&self) -> usize {
        self.0.size.unwrap_or(0)
    }

    pub fn is_sized(&self) -> bool {
        self.0.size.is_some()
    }

    pub fn alignment(&self) -> usize {
        self.0.alignment
    }

    pub fn abi(&self) -> AbiTag {
        self.0.abi
    }

    pub fn strategy(&self) -> &MarshalStrategy {
        &self.0.strategy
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.0.kind, TypeKind::Mapped)
    }

    /// Element type and length when this is an array type.
    pub fn as_array(&self) -> Option<(&TypeDescriptor, usize)> {
        match &self.0.kind {
            TypeKind::Array { element, length } => Some((element, *length)),
            _ => None,
        }
    }

    /// # Safety
    /// `data` must be valid for reads of `self.size()` bytes.
    pub unsafe fn read(&self, data: *const u8) -> FfiResult<Value> {
        self.0.strategy.read(data)
    }

    /// # Safety
    /// `data` must be valid for writes of `self.size()` bytes.
    pub unsafe fn write(&self, data: *mut u8, value: &Value) -> FfiResult<()> {
        self.0.strategy.write(data, value)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.0.name)
            .field("size", &self.0.size)
            .field("alignment", &self.0.alignment)
            .field("abi", &self.0.abi)
            .field("strategy", &self.0.strategy)
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.size {
            Some(size) => write!(f, "#<Type {} size={}>", self.0.name, size),
            None => write!(f, "#<Type {} unsized>", self.0.name),
        }
    }
}
