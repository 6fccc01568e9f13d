use std::rc::Rc;

use marrow_memory::{MemoryRegion, NonOwningView, TypeHint};
use marrow_types::{Address, FfiResult, TypeDescriptor};

use crate::instance::StructInstance;
use crate::layout::StructLayout;

impl From<&StructLayout> for TypeHint {
    fn from(layout: &StructLayout) -> Self {
        TypeHint::Struct { name: layout.name().to_string(), size: layout.size() }
    }
}

/// A struct type used as a native value type.
///
/// The descriptor carries the struct's size but the void ABI tag, so call
/// descriptors can only pass such structs correctly by pointer. Inside
/// another layout, embed it with [`crate::Field::nested`] or
/// [`crate::LayoutBuilder::nested`] so the field reads as a struct.
#[derive(Debug, Clone)]
pub struct StructByValue {
    layout: Rc<StructLayout>,
    descriptor: TypeDescriptor,
}

impl StructByValue {
    pub fn new(layout: Rc<StructLayout>) -> Self {
        let descriptor = TypeDescriptor::opaque(layout.name(), layout.size(), layout.alignment());
        StructByValue { layout, descriptor }
    }

    pub fn struct_layout(&self) -> &Rc<StructLayout> {
        &self.layout
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Views the struct stored at `address` without copying or owning it.
    pub fn read(&self, address: Address) -> StructInstance {
        let view = NonOwningView::wrap(address).with_length(self.layout.size());
        StructInstance::wrap(self.layout.clone(), Rc::new(view))
    }

    /// Views the struct stored `offset` bytes into `region`.
    pub fn read_from(&self, region: &dyn MemoryRegion, offset: i64) -> FfiResult<StructInstance> {
        let view = region.slice(offset, self.layout.size())?;
        Ok(StructInstance::wrap(self.layout.clone(), Rc::new(view)))
    }
}
