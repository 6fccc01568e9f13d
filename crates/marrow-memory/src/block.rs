use std::alloc::{self, Layout};
use std::cell::Cell;
use std::rc::Rc;

use marrow_types::{Address, FfiError, FfiResult};

/// Alignment of every owned block; enough for any scalar the catalog knows.
pub(crate) const BLOCK_ALIGN: usize = 16;

/// One zero-initialized heap allocation with a one-shot release.
///
/// Owners release explicitly or on drop; views keep the block alive through
/// an `Rc` but never release it.
pub(crate) struct Block {
    address: Address,
    size: usize,
    /// `None` for zero-sized blocks, which are never handed to the allocator.
    layout: Option<Layout>,
    released: Cell<bool>,
}

impl Block {
    pub(crate) fn allocate(size: usize) -> FfiResult<Rc<Block>> {
        if size == 0 {
            // Dangling but aligned, like the global allocator's ZST pointers.
            return Ok(Rc::new(Block {
                address: Address::new(BLOCK_ALIGN),
                size,
                layout: None,
                released: Cell::new(false),
            }));
        }
        let layout = Layout::from_size_align(size, BLOCK_ALIGN)
            .map_err(|_| FfiError::AllocationFailed { size })?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(FfiError::AllocationFailed { size });
        }
        log::debug!("allocated {size} bytes at {ptr:p}");
        Ok(Rc::new(Block {
            address: Address::from_ptr(ptr),
            size,
            layout: Some(layout),
            released: Cell::new(false),
        }))
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Frees the allocation. Returns `false`, and does nothing, if it was
    /// already released.
    pub(crate) fn release(&self) -> bool {
        if self.released.replace(true) {
            log::warn!("ignoring repeated release of {} byte block at {}", self.size, self.address);
            return false;
        }
        if let Some(layout) = self.layout {
            // SAFETY: allocated with this layout in `allocate`; the flag above
            // guarantees this runs once.
            unsafe { alloc::dealloc(self.address.as_ptr(), layout) };
            log::debug!("released {} bytes at {}", self.size, self.address);
        }
        true
    }

    pub(crate) fn ensure_live(&self) -> FfiResult<()> {
        if self.is_released() {
            Err(FfiError::UseAfterRelease { address: self.address.raw() })
        } else {
            Ok(())
        }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if !self.is_released() {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_start_zeroed_and_aligned() {
        let block = Block::allocate(64).unwrap();
        assert_eq!(block.address().raw() % BLOCK_ALIGN, 0);
        let bytes = unsafe { std::slice::from_raw_parts(block.address().as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn release_happens_once() {
        let block = Block::allocate(8).unwrap();
        assert!(block.release());
        assert!(!block.release());
        assert!(block.ensure_live().is_err());
    }

    #[test]
    fn zero_sized_blocks_are_not_null() {
        let block = Block::allocate(0).unwrap();
        assert!(!block.address().is_null());
        assert!(block.release());
    }
}
