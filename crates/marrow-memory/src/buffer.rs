use std::fmt;
use std::rc::Rc;

use marrow_types::{Address, FfiResult, TypeDescriptor};

use crate::block::Block;
use crate::hint::TypeHint;
use crate::region::MemoryRegion;
use crate::view::{advance_view, derive_view, NonOwningView};

/// Zero-initialized memory owned by the caller, released explicitly with
/// [`OwnedBuffer::release`] or when dropped.
///
/// Views taken from a buffer keep the bytes alive after the buffer itself
/// is dropped, but fail with `UseAfterRelease` after an explicit release.
pub struct OwnedBuffer {
    block: Rc<Block>,
    unit_size: usize,
    element: Option<TypeDescriptor>,
}

impl OwnedBuffer {
    /// Allocates `count` elements of the hinted size. Memory is always
    /// zeroed; `clear` is accepted so callers can state their intent.
    pub fn new(hint: impl Into<TypeHint>, count: usize, clear: bool) -> FfiResult<Self> {
        let (unit_size, element) = hint.into().resolve()?;
        let block = Block::allocate(unit_size.saturating_mul(count))?;
        log::trace!("buffer of {count} x {unit_size} bytes (clear={clear})");
        Ok(OwnedBuffer { block, unit_size, element })
    }

    /// A buffer the callee only reads.
    pub fn alloc_in(hint: impl Into<TypeHint>, count: usize) -> FfiResult<Self> {
        Self::new(hint, count, true)
    }

    /// A buffer the callee only writes.
    pub fn alloc_out(hint: impl Into<TypeHint>, count: usize) -> FfiResult<Self> {
        Self::new(hint, count, true)
    }

    pub fn alloc_inout(hint: impl Into<TypeHint>, count: usize) -> FfiResult<Self> {
        Self::new(hint, count, true)
    }

    /// Element type named by the allocation hint, if any.
    pub fn element_type(&self) -> Option<&TypeDescriptor> {
        self.element.as_ref()
    }

    /// Frees the memory. Repeated calls do nothing.
    pub fn release(&self) {
        self.block.release();
    }

    pub fn is_released(&self) -> bool {
        self.block.is_released()
    }
}

impl MemoryRegion for OwnedBuffer {
    fn address(&self) -> Address {
        self.block.address()
    }

    fn size(&self) -> usize {
        self.block.size()
    }

    fn unit_size(&self) -> usize {
        self.unit_size
    }

    fn ensure_live(&self) -> FfiResult<()> {
        self.block.ensure_live()
    }

    fn slice(&self, offset: i64, size: usize) -> FfiResult<NonOwningView> {
        derive_view(self, Some(self.block.clone()), offset, size, 1)
    }

    fn advance(&self, delta: i64) -> FfiResult<NonOwningView> {
        advance_view(self, Some(self.block.clone()), delta)
    }
}

impl PartialEq for OwnedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("address", &self.address())
            .field("size", &self.size())
            .field("unit_size", &self.unit_size)
            .field("released", &self.is_released())
            .finish()
    }
}

impl fmt::Display for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<Buffer address={} size={}>", self.address(), self.size())
    }
}
