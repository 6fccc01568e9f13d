//! Owned and borrowed native memory with bounds-checked typed access.

mod block;
pub mod buffer;
pub mod hint;
pub mod pointer;
pub mod region;
pub mod view;

pub use buffer::OwnedBuffer;
pub use hint::TypeHint;
pub use pointer::OwnedPointer;
pub use region::{accessor_type, element_offset, MemoryRegion, ACCESSOR_ALIASES};
pub use view::{NonOwningView, UNBOUNDED};
