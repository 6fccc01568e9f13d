//! Read/write marshalling strategies, one per native type family.
//!
//! A strategy is chosen once when a descriptor is registered and cached on
//! it, so reading or writing never re-dispatches on the type name.

use std::ffi::CStr;
use std::fmt;
use std::ptr;

use crate::descriptor::TypeDescriptor;
use crate::error::{FfiError, FfiResult};
use crate::mapped::DataConverter;
use crate::value::{Address, Value};

#[derive(Clone)]
pub enum MarshalStrategy {
    /// Sign-extending integer of `width` bytes.
    Signed { width: usize },
    /// Zero-extending integer of `width` bytes.
    Unsigned { width: usize },
    /// IEEE float stored in `width` bytes. Widths above 8 (long double) are
    /// read and written through their first 8 bytes as a double.
    Float { width: usize },
    Bool { width: usize },
    Pointer,
    /// `char *`: reads copy up to the NUL, writes allocate a new native buffer.
    String,
    Void,
    /// User conversion layered over the delegate's strategy.
    Mapped {
        converter: DataConverter,
        delegate: TypeDescriptor,
    },
}

impl MarshalStrategy {
    /// Converts the bytes at `data` into a host value.
    ///
    /// # Safety
    /// `data` must be valid for reads of the strategy's storage width.
    pub unsafe fn read(&self, data: *const u8) -> FfiResult<Value> {
        match self {
            MarshalStrategy::Signed { width } => Ok(Value::Int(read_signed(data, *width))),
            MarshalStrategy::Unsigned { width } => Ok(Value::UInt(read_unsigned(data, *width))),
            MarshalStrategy::Float { width } => Ok(Value::Float(read_float(data, *width))),
            MarshalStrategy::Bool { width } => Ok(Value::Bool(read_unsigned(data, *width) != 0)),
            MarshalStrategy::Pointer => Ok(Value::Pointer(read_address(data))),
            MarshalStrategy::String => {
                let address = read_address(data);
                if address.is_null() {
                    return Ok(Value::Nil);
                }
                let c_str = CStr::from_ptr(address.as_ptr() as *const libc::c_char);
                Ok(Value::Str(c_str.to_string_lossy().into_owned()))
            }
            MarshalStrategy::Void => Ok(Value::Nil),
            MarshalStrategy::Mapped { converter, delegate } => {
                let native = delegate.strategy().read(data)?;
                converter.from_native(&native)
            }
        }
    }

    /// Coerces `value` and stores it at `data`.
    ///
    /// # Safety
    /// `data` must be valid for writes of the strategy's storage width.
    pub unsafe fn write(&self, data: *mut u8, value: &Value) -> FfiResult<()> {
        match self {
            MarshalStrategy::Signed { width } => {
                write_integer(data, value.coerce_int()? as u64, *width);
                Ok(())
            }
            MarshalStrategy::Unsigned { width } => {
                write_integer(data, value.coerce_uint()?, *width);
                Ok(())
            }
            MarshalStrategy::Float { width } => {
                write_float(data, value.coerce_float()?, *width);
                Ok(())
            }
            MarshalStrategy::Bool { width } => {
                write_integer(data, value.is_truthy() as u64, *width);
                Ok(())
            }
            MarshalStrategy::Pointer => {
                write_address(data, value.coerce_pointer()?);
                Ok(())
            }
            MarshalStrategy::String => {
                // The native buffer belongs to whoever reads this slot.
                let address = alloc_c_string(&value.coerce_str()?)?;
                write_address(data, address);
                Ok(())
            }
            MarshalStrategy::Void => Ok(()),
            MarshalStrategy::Mapped { converter, delegate } => {
                let native = converter.to_native(value)?;
                delegate.strategy().write(data, &native)
            }
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            MarshalStrategy::Signed { .. } => "signed",
            MarshalStrategy::Unsigned { .. } => "unsigned",
            MarshalStrategy::Float { .. } => "float",
            MarshalStrategy::Bool { .. } => "bool",
            MarshalStrategy::Pointer => "pointer",
            MarshalStrategy::String => "string",
            MarshalStrategy::Void => "void",
            MarshalStrategy::Mapped { .. } => "mapped",
        }
    }
}

impl fmt::Debug for MarshalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalStrategy::Signed { width }
            | MarshalStrategy::Unsigned { width }
            | MarshalStrategy::Float { width }
            | MarshalStrategy::Bool { width } => write!(f, "{}({width})", self.family()),
            MarshalStrategy::Mapped { delegate, .. } => write!(f, "mapped({})", delegate.name()),
            _ => f.write_str(self.family()),
        }
    }
}

unsafe fn read_signed(data: *const u8, width: usize) -> i64 {
    match width {
        1 => ptr::read_unaligned(data as *const i8) as i64,
        2 => ptr::read_unaligned(data as *const i16) as i64,
        4 => ptr::read_unaligned(data as *const i32) as i64,
        _ => ptr::read_unaligned(data as *const i64),
    }
}

unsafe fn read_unsigned(data: *const u8, width: usize) -> u64 {
    match width {
        1 => ptr::read_unaligned(data) as u64,
        2 => ptr::read_unaligned(data as *const u16) as u64,
        4 => ptr::read_unaligned(data as *const u32) as u64,
        _ => ptr::read_unaligned(data as *const u64),
    }
}

/// Truncating store: only the low `width` bytes of `bits` are written.
unsafe fn write_integer(data: *mut u8, bits: u64, width: usize) {
    match width {
        1 => ptr::write_unaligned(data, bits as u8),
        2 => ptr::write_unaligned(data as *mut u16, bits as u16),
        4 => ptr::write_unaligned(data as *mut u32, bits as u32),
        _ => ptr::write_unaligned(data as *mut u64, bits),
    }
}

unsafe fn read_float(data: *const u8, width: usize) -> f64 {
    if width == 4 {
        ptr::read_unaligned(data as *const f32) as f64
    } else {
        ptr::read_unaligned(data as *const f64)
    }
}

unsafe fn write_float(data: *mut u8, x: f64, width: usize) {
    if width == 4 {
        ptr::write_unaligned(data as *mut f32, x as f32)
    } else {
        ptr::write_unaligned(data as *mut f64, x)
    }
}

unsafe fn read_address(data: *const u8) -> Address {
    Address::new(ptr::read_unaligned(data as *const usize))
}

unsafe fn write_address(data: *mut u8, address: Address) {
    ptr::write_unaligned(data as *mut usize, address.raw())
}

/// Copies `s` into a `malloc`ed NUL-terminated buffer so native code can
/// `free` it.
fn alloc_c_string(s: &str) -> FfiResult<Address> {
    let bytes = s.as_bytes();
    // SAFETY: the buffer is len + 1 bytes; we copy len bytes and the NUL.
    unsafe {
        let buffer = libc::malloc(bytes.len() + 1) as *mut u8;
        if buffer.is_null() {
            return Err(FfiError::AllocationFailed { size: bytes.len() + 1 });
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len());
        *buffer.add(bytes.len()) = 0;
        log::trace!("allocated {} byte native string at {:p}", bytes.len() + 1, buffer);
        Ok(Address::from_ptr(buffer))
    }
}
