use std::fmt;
use std::rc::Rc;

use marrow_types::{Address, FfiResult, TypeDescriptor};

use crate::block::Block;
use crate::hint::TypeHint;
use crate::region::MemoryRegion;
use crate::view::{advance_view, derive_view, NonOwningView};

/// A pointer that owns its target. The memory is released exactly when the
/// pointer (and the last view derived from it) is dropped.
pub struct OwnedPointer {
    block: Rc<Block>,
    unit_size: usize,
    element: Option<TypeDescriptor>,
}

impl OwnedPointer {
    pub fn new(hint: impl Into<TypeHint>, count: usize) -> FfiResult<Self> {
        let (unit_size, element) = hint.into().resolve()?;
        let block = Block::allocate(unit_size.saturating_mul(count))?;
        Ok(OwnedPointer { block, unit_size, element })
    }

    pub fn element_type(&self) -> Option<&TypeDescriptor> {
        self.element.as_ref()
    }

    /// Total bytes owned.
    pub fn total(&self) -> usize {
        self.block.size()
    }
}

impl MemoryRegion for OwnedPointer {
    fn address(&self) -> Address {
        self.block.address()
    }

    fn size(&self) -> usize {
        self.block.size()
    }

    fn unit_size(&self) -> usize {
        self.unit_size
    }

    fn slice(&self, offset: i64, size: usize) -> FfiResult<NonOwningView> {
        derive_view(self, Some(self.block.clone()), offset, size, 1)
    }

    fn advance(&self, delta: i64) -> FfiResult<NonOwningView> {
        advance_view(self, Some(self.block.clone()), delta)
    }
}

impl PartialEq for OwnedPointer {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl fmt::Debug for OwnedPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedPointer")
            .field("address", &self.address())
            .field("size", &self.size())
            .field("unit_size", &self.unit_size)
            .finish()
    }
}

impl fmt::Display for OwnedPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<MemoryPointer address={} size={}>", self.address(), self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_types::Value;

    #[test]
    fn count_scales_every_hint() {
        assert_eq!(OwnedPointer::new("int64", 3).unwrap().total(), 24);
        assert_eq!(OwnedPointer::new(Value::from("int"), 2).unwrap().total(), 8);
        assert_eq!(OwnedPointer::new(10usize, 2).unwrap().total(), 20);
    }

    #[test]
    fn views_outlive_the_pointer() {
        let pointer = OwnedPointer::new("uint32", 1).unwrap();
        pointer.write("uint32", &Value::UInt(99)).unwrap();
        let view = pointer.slice(0, 4).unwrap();
        drop(pointer);
        assert_eq!(view.read("uint32").unwrap(), Value::UInt(99));
    }
}
