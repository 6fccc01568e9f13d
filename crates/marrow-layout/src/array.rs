use std::fmt;
use std::rc::Rc;

use marrow_memory::{element_offset, MemoryRegion, NonOwningView};
use marrow_types::{FfiError, FfiResult, TypeDescriptor, Value};

/// A cursor over `length` consecutive elements inside a struct's memory.
///
/// Indexes past `length` are not rejected here; only the backing region's
/// bounds are enforced.
#[derive(Clone)]
pub struct InlineArrayView {
    memory: Rc<dyn MemoryRegion>,
    element: TypeDescriptor,
    offset: usize,
    length: usize,
}

impl InlineArrayView {
    pub fn new(memory: Rc<dyn MemoryRegion>, element: TypeDescriptor, offset: usize, length: usize) -> Self {
        InlineArrayView { memory, element, offset, length }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn element_type(&self) -> &TypeDescriptor {
        &self.element
    }

    fn element_offset(&self, index: usize) -> FfiResult<i64> {
        let stride = self.element.size();
        let base = self.offset as i64;
        element_offset(base, index, stride).ok_or_else(|| FfiError::out_of_bounds(base, stride, self.memory.size()))
    }

    pub fn get(&self, index: usize) -> FfiResult<Value> {
        self.memory.get_typed(&self.element, self.element_offset(index)?)
    }

    pub fn set(&self, index: usize, value: &Value) -> FfiResult<()> {
        self.memory.put_typed(&self.element, self.element_offset(index)?, value)
    }

    /// Reads elements `0..len()` in order. Each call starts a new traversal.
    pub fn iter(&self) -> impl Iterator<Item = FfiResult<Value>> + '_ {
        (0..self.length).map(move |index| self.get(index))
    }

    pub fn to_vec(&self) -> FfiResult<Vec<Value>> {
        self.iter().collect()
    }

    /// A pointer to the first element covering the whole array.
    pub fn to_ptr(&self) -> FfiResult<NonOwningView> {
        self.memory
            .slice(self.offset as i64, self.length.saturating_mul(self.element.size()))
            .map(|view| view.with_unit_size(self.element.size()))
    }
}

impl fmt::Debug for InlineArrayView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineArrayView")
            .field("address", &self.memory.address())
            .field("element", &self.element.name())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}
