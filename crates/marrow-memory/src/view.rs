use std::fmt;
use std::rc::Rc;

use marrow_types::{Address, FfiError, FfiResult};

use crate::block::Block;
use crate::region::MemoryRegion;

/// Declared length of a wrapped address nobody has sized yet.
pub const UNBOUNDED: usize = usize::MAX;

/// A pointer that aliases memory it has no authority to release.
///
/// Views derived from an owner keep its block alive and report
/// `UseAfterRelease` once the owner releases it explicitly.
#[derive(Clone)]
pub struct NonOwningView {
    address: Address,
    size: usize,
    unit_size: usize,
    keeper: Option<Rc<Block>>,
}

impl NonOwningView {
    /// Reinterprets a raw address. The result has no declared length.
    pub fn wrap(address: Address) -> Self {
        NonOwningView { address, size: UNBOUNDED, unit_size: 1, keeper: None }
    }

    pub fn null() -> Self {
        Self::wrap(Address::NULL)
    }

    /// The same address with a declared length of `length` bytes.
    pub fn with_length(self, length: usize) -> Self {
        NonOwningView { size: length, ..self }
    }

    /// The same address stepping `unit_size` bytes per subscript.
    pub fn with_unit_size(self, unit_size: usize) -> Self {
        NonOwningView { unit_size, ..self }
    }

    pub fn is_bounded(&self) -> bool {
        self.size != UNBOUNDED
    }
}

pub(crate) fn derive_view(
    region: &dyn MemoryRegion,
    keeper: Option<Rc<Block>>,
    offset: i64,
    size: usize,
    unit_size: usize,
) -> FfiResult<NonOwningView> {
    let ptr = region.checked_ptr(offset, size)?;
    Ok(NonOwningView { address: Address::from_ptr(ptr), size, unit_size, keeper })
}

pub(crate) fn advance_view(
    region: &dyn MemoryRegion,
    keeper: Option<Rc<Block>>,
    delta: i64,
) -> FfiResult<NonOwningView> {
    let total = region.size();
    let unit_size = region.unit_size();
    if total == UNBOUNDED {
        let ptr = region.checked_ptr(delta, 0)?;
        return Ok(NonOwningView { address: Address::from_ptr(ptr), size: UNBOUNDED, unit_size, keeper });
    }
    if delta < 0 || delta as u64 > total as u64 {
        return Err(FfiError::out_of_bounds(delta, 0, total));
    }
    derive_view(region, keeper, delta, total - delta as usize, unit_size)
}

impl MemoryRegion for NonOwningView {
    fn address(&self) -> Address {
        self.address
    }

    fn size(&self) -> usize {
        self.size
    }

    fn unit_size(&self) -> usize {
        self.unit_size
    }

    fn ensure_live(&self) -> FfiResult<()> {
        match &self.keeper {
            Some(block) => block.ensure_live(),
            None => Ok(()),
        }
    }

    fn slice(&self, offset: i64, size: usize) -> FfiResult<NonOwningView> {
        derive_view(self, self.keeper.clone(), offset, size, 1)
    }

    fn advance(&self, delta: i64) -> FfiResult<NonOwningView> {
        advance_view(self, self.keeper.clone(), delta)
    }
}

impl PartialEq for NonOwningView {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for NonOwningView {}

impl fmt::Debug for NonOwningView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonOwningView")
            .field("address", &self.address)
            .field("size", &self.size)
            .field("unit_size", &self.unit_size)
            .field("borrowed", &self.keeper.is_some())
            .finish()
    }
}

impl fmt::Display for NonOwningView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bounded() {
            write!(f, "#<Pointer address={} size={}>", self.address, self.size)
        } else {
            write!(f, "#<Pointer address={}>", self.address)
        }
    }
}
