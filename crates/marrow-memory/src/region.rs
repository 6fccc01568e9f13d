use std::ffi::{c_long, CStr};
use std::mem;

use marrow_types::{find_type, Address, FfiError, FfiResult, TypeDescriptor, Value};

use crate::view::NonOwningView;

const LONG_CANONICAL: &str = if mem::size_of::<c_long>() == 8 { "INT64" } else { "INT32" };
const ULONG_CANONICAL: &str = if mem::size_of::<c_long>() == 8 { "UINT64" } else { "UINT32" };

/// Lower-case accessor names and the canonical type each one stands for.
pub const ACCESSOR_ALIASES: &[(&str, &str)] = &[
    ("char", "INT8"),
    ("uchar", "UINT8"),
    ("short", "INT16"),
    ("ushort", "UINT16"),
    ("int", "INT32"),
    ("uint", "UINT32"),
    ("long_long", "INT64"),
    ("ulong_long", "UINT64"),
    ("float", "FLOAT32"),
    ("double", "FLOAT64"),
    ("long", LONG_CANONICAL),
    ("ulong", ULONG_CANONICAL),
];

/// Resolves an accessor type name (`int32`, `uchar`, `long`, ...) to its
/// descriptor. Names outside the alias table go straight to the catalog.
pub fn accessor_type(name: &str) -> FfiResult<TypeDescriptor> {
    let lower = name.to_ascii_lowercase();
    let canonical = ACCESSOR_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(name, |(_, canonical)| *canonical);
    find_type(canonical)
}

/// Byte offset of element `index` of `stride` bytes starting at `base`.
/// `None` when the offset does not fit an `i64`.
pub fn element_offset(base: i64, index: usize, stride: usize) -> Option<i64> {
    (index as u64)
        .checked_mul(stride as u64)
        .and_then(|delta| i64::try_from(delta).ok())
        .and_then(|delta| base.checked_add(delta))
}

/// Bounds-checked typed access to a contiguous run of native bytes.
///
/// Every access first rejects a NULL base address, then a released owner,
/// then any window that is not inside `[0, size())`.
pub trait MemoryRegion {
    fn address(&self) -> Address;

    /// Declared length in bytes. For views this may be narrower than the
    /// owner's allocation.
    fn size(&self) -> usize;

    /// Size of one logical element, used by `subscript`.
    fn unit_size(&self) -> usize {
        1
    }

    /// Fails once the memory behind this region has been released.
    fn ensure_live(&self) -> FfiResult<()> {
        Ok(())
    }

    /// A view of `size` bytes starting `offset` bytes in.
    fn slice(&self, offset: i64, size: usize) -> FfiResult<NonOwningView>;

    /// A view of the bytes from `delta` to the end of this region.
    fn advance(&self, delta: i64) -> FfiResult<NonOwningView>;

    /// The `index`-th element, `unit_size()` bytes wide.
    fn subscript(&self, index: i64) -> FfiResult<NonOwningView> {
        let unit = self.unit_size();
        self.slice(index.wrapping_mul(unit as i64), unit)
    }

    fn is_null(&self) -> bool {
        self.address().is_null()
    }

    /// Raw pointer to `[offset, offset + len)` after the null, liveness and
    /// bounds checks.
    fn checked_ptr(&self, offset: i64, len: usize) -> FfiResult<*mut u8> {
        if self.is_null() {
            return Err(FfiError::NullPointerAccess { offset, size: len });
        }
        self.ensure_live()?;
        let limit = self.size();
        let in_bounds = offset >= 0
            && (offset as u64)
                .checked_add(len as u64)
                .map_or(false, |end| end <= limit as u64);
        if !in_bounds {
            return Err(FfiError::out_of_bounds(offset, len, limit));
        }
        Ok(self.address().offset(offset).as_ptr())
    }

    fn get_typed(&self, ty: &TypeDescriptor, offset: i64) -> FfiResult<Value> {
        let ptr = self.checked_ptr(offset, ty.size())?;
        log::trace!("get {} at {}+{offset}", ty.name(), self.address());
        // SAFETY: checked_ptr proved `ty.size()` bytes are inside the region.
        unsafe { ty.read(ptr) }
    }

    fn put_typed(&self, ty: &TypeDescriptor, offset: i64, value: &Value) -> FfiResult<()> {
        let ptr = self.checked_ptr(offset, ty.size())?;
        log::trace!("put {} at {}+{offset}", ty.name(), self.address());
        // SAFETY: as in get_typed.
        unsafe { ty.write(ptr, value) }
    }

    fn get(&self, type_name: &str, offset: i64) -> FfiResult<Value> {
        self.get_typed(&accessor_type(type_name)?, offset)
    }

    fn put(&self, type_name: &str, offset: i64, value: &Value) -> FfiResult<()> {
        self.put_typed(&accessor_type(type_name)?, offset, value)
    }

    fn read(&self, type_name: &str) -> FfiResult<Value> {
        self.get(type_name, 0)
    }

    fn write(&self, type_name: &str, value: &Value) -> FfiResult<()> {
        self.put(type_name, 0, value)
    }

    fn get_array_of(&self, type_name: &str, offset: i64, count: usize) -> FfiResult<Vec<Value>> {
        let ty = accessor_type(type_name)?;
        let stride = ty.size();
        (0..count)
            .map(|i| {
                let at = element_offset(offset, i, stride)
                    .ok_or_else(|| FfiError::out_of_bounds(offset, stride, self.size()))?;
                self.get_typed(&ty, at)
            })
            .collect()
    }

    fn put_array_of(&self, type_name: &str, offset: i64, values: &[Value]) -> FfiResult<()> {
        let ty = accessor_type(type_name)?;
        let stride = ty.size();
        let total = stride
            .checked_mul(values.len())
            .ok_or(FfiError::OutOfBounds { offset, size: i64::MAX, limit: self.size() })?;
        // Check the whole window up front so a failing put writes nothing.
        self.checked_ptr(offset, total)?;
        for (i, value) in values.iter().enumerate() {
            // In range: the whole window passed the check above.
            let at = offset + (i * stride) as i64;
            self.put_typed(&ty, at, value)?;
        }
        Ok(())
    }

    fn read_array_of(&self, type_name: &str, count: usize) -> FfiResult<Vec<Value>> {
        self.get_array_of(type_name, 0, count)
    }

    fn write_array_of(&self, type_name: &str, values: &[Value]) -> FfiResult<()> {
        self.put_array_of(type_name, 0, values)
    }

    fn get_bytes(&self, offset: i64, length: i64) -> FfiResult<Vec<u8>> {
        if self.is_null() {
            return Err(FfiError::NullPointerAccess { offset, size: length.max(0) as usize });
        }
        if length < 0 {
            return Err(FfiError::OutOfBounds { offset, size: length, limit: self.size() });
        }
        let ptr = self.checked_ptr(offset, length as usize)?;
        // SAFETY: the window was bounds-checked above.
        Ok(unsafe { std::slice::from_raw_parts(ptr, length as usize) }.to_vec())
    }

    /// Copies `length` bytes of `data`, starting at `src_offset`, to
    /// `dest_offset`. `length` defaults to the rest of `data`.
    fn put_bytes(&self, dest_offset: i64, data: &[u8], src_offset: i64, length: Option<i64>) -> FfiResult<()> {
        if self.is_null() {
            return Err(FfiError::NullPointerAccess {
                offset: dest_offset,
                size: length.unwrap_or(0).max(0) as usize,
            });
        }
        let available = data.len();
        let range_error = |length: i64| FfiError::RangeError { offset: src_offset, length, available };
        if src_offset < 0 || src_offset as u64 > available as u64 {
            return Err(range_error(length.unwrap_or(0)));
        }
        let length = length.unwrap_or(available as i64 - src_offset);
        if length < 0 {
            return Err(FfiError::OutOfBounds { offset: dest_offset, size: length, limit: self.size() });
        }
        let end = src_offset.checked_add(length).ok_or_else(|| range_error(length))?;
        if end > available as i64 {
            return Err(range_error(length));
        }
        let ptr = self.checked_ptr(dest_offset, length as usize)?;
        let source = &data[src_offset as usize..end as usize];
        // SAFETY: destination window checked; source is a distinct host slice.
        unsafe { std::ptr::copy_nonoverlapping(source.as_ptr(), ptr, source.len()) };
        Ok(())
    }

    /// Reads a NUL-terminated string starting at `offset`. The first byte
    /// must lie inside the region; the terminator is found by scanning
    /// native memory, so it may lie past `size()`.
    fn get_string(&self, offset: i64) -> FfiResult<String> {
        let ptr = self.checked_ptr(offset, 1)?;
        // SAFETY: the start is inside the region; finding a NUL is the
        // caller's contract, as with any C string.
        let text = unsafe { CStr::from_ptr(ptr as *const std::ffi::c_char) };
        Ok(text.to_string_lossy().into_owned())
    }

    /// Writes `text` plus a terminating NUL at `offset`.
    fn put_string(&self, offset: i64, text: &str) -> FfiResult<()> {
        let ptr = self.checked_ptr(offset, text.len() + 1)?;
        // SAFETY: `text.len() + 1` bytes were bounds-checked.
        unsafe {
            std::ptr::copy_nonoverlapping(text.as_ptr(), ptr, text.len());
            *ptr.add(text.len()) = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_aliases_resolve_to_canonical_types() {
        for (alias, canonical) in ACCESSOR_ALIASES {
            assert_eq!(accessor_type(alias).unwrap(), find_type(canonical).unwrap());
        }
    }

    #[test]
    fn long_matches_c_long() {
        assert_eq!(accessor_type("long").unwrap().size(), mem::size_of::<c_long>());
        assert_eq!(accessor_type("ULONG").unwrap().size(), mem::size_of::<c_long>());
    }

    #[test]
    fn unaliased_names_use_the_catalog() {
        assert_eq!(accessor_type("int32").unwrap().name(), "INT32");
        assert_eq!(accessor_type("pointer").unwrap().name(), "POINTER");
        assert!(matches!(accessor_type("nonsense"), Err(FfiError::UnknownType(_))));
    }
}
