use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::rc::Rc;

use libffi::middle::CodePtr;
use libffi::raw;

use marrow_memory::{MemoryRegion, OwnedBuffer};
use marrow_types::{find_type, AbiTag, Address, FfiError, FfiResult, TypeDescriptor, Value};

use crate::descriptor::{call_abi, CallDescriptor};

/// Scratch memory for one native call through a [`CallDescriptor`].
///
/// Arguments are marshalled into their slots, the call reads them through
/// the pointer array at the start of the buffer and the result lands in the
/// result slot.
pub struct ExchangeBuffer {
    descriptor: Rc<CallDescriptor>,
    buffer: OwnedBuffer,
    pointer: TypeDescriptor,
}

impl ExchangeBuffer {
    pub fn new(descriptor: Rc<CallDescriptor>) -> FfiResult<Self> {
        let buffer = OwnedBuffer::new(descriptor.exchange_size(), 1, true)?;
        let pointer = find_type("POINTER")?;
        let slot_size = mem::size_of::<*mut c_void>();
        for (index, &offset) in descriptor.argument_offsets().iter().enumerate() {
            let slot = Value::Pointer(buffer.address().offset(offset as i64));
            buffer.put_typed(&pointer, (index * slot_size) as i64, &slot)?;
        }
        Ok(ExchangeBuffer { descriptor, buffer, pointer })
    }

    pub fn descriptor(&self) -> &Rc<CallDescriptor> {
        &self.descriptor
    }

    /// The raw exchange bytes.
    pub fn buffer(&self) -> &OwnedBuffer {
        &self.buffer
    }

    fn argument_type(&self, index: usize) -> FfiResult<&TypeDescriptor> {
        self.descriptor.argument_types().get(index).ok_or_else(|| FfiError::InvalidArgumentType {
            position: format!("argument {index}"),
            found: format!("only {} arguments in {}", self.descriptor.argument_types().len(), self.descriptor.signature()),
        })
    }

    /// Marshals `value` into the slot of argument `index`.
    pub fn set_argument(&self, index: usize, value: &Value) -> FfiResult<()> {
        let ty = self.argument_type(index)?;
        let offset = self.descriptor.argument_offsets()[index] as i64;
        if ty.abi() == AbiTag::Void {
            self.buffer.put_typed(&self.pointer, offset, value)
        } else {
            self.buffer.put_typed(ty, offset, value)
        }
    }

    pub fn set_arguments(&self, values: &[Value]) -> FfiResult<()> {
        let expected = self.descriptor.argument_types().len();
        if values.len() != expected {
            return Err(FfiError::InvalidArgumentType {
                position: "arguments".to_string(),
                found: format!("{} values for {}", values.len(), self.descriptor.signature()),
            });
        }
        for (index, value) in values.iter().enumerate() {
            self.set_argument(index, value)?;
        }
        Ok(())
    }

    /// Calls `function` with the marshalled arguments and returns the result.
    ///
    /// # Safety
    /// `function` must be the address of a C function whose signature
    /// matches the descriptor.
    pub unsafe fn invoke(&self, function: Address) -> FfiResult<Value> {
        if function.is_null() {
            return Err(FfiError::NullPointerAccess { offset: 0, size: 0 });
        }
        self.buffer.ensure_live()?;
        let code = CodePtr::from_ptr(function.as_ptr() as *const c_void);
        let base = self.buffer.address();
        log::trace!("calling {} at {function}", self.descriptor.signature());
        raw::ffi_call(
            self.descriptor.abi_handle(),
            Some(*code.as_safe_fun()),
            base.offset(self.descriptor.result_offset() as i64).as_ptr() as *mut c_void,
            base.as_ptr() as *mut *mut c_void,
        );
        self.result()
    }

    /// Reads the result slot. Results narrower than a register were widened
    /// by libffi; on little-endian targets their low bytes come first.
    pub fn result(&self) -> FfiResult<Value> {
        let ty = self.descriptor.return_type();
        let offset = self.descriptor.result_offset() as i64;
        match call_abi(ty, false) {
            AbiTag::Void => Ok(Value::Nil),
            AbiTag::Pointer if ty.abi() == AbiTag::Void => self.buffer.get_typed(&self.pointer, offset),
            _ => self.buffer.get_typed(ty, offset),
        }
    }
}

impl fmt::Debug for ExchangeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeBuffer")
            .field("signature", &self.descriptor.signature())
            .field("buffer", &self.buffer)
            .finish()
    }
}
