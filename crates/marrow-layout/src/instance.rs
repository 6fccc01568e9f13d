use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use marrow_memory::{MemoryRegion, OwnedBuffer, TypeHint};
use marrow_types::{FfiResult, Value};

use crate::field::FieldValue;
use crate::layout::{NativeStruct, StructLayout};

/// A struct layout bound to memory.
///
/// Instances either wrap memory supplied by the caller or allocate their
/// own on first field access. Self-allocated memory is released by
/// [`StructInstance::free`] or when the instance is dropped.
pub struct StructInstance {
    layout: Rc<StructLayout>,
    native: OnceCell<NativeStruct>,
    memory: RefCell<Option<Rc<dyn MemoryRegion>>>,
    owned: RefCell<Option<Rc<OwnedBuffer>>>,
}

impl StructInstance {
    /// An instance that allocates its memory lazily.
    pub fn new(layout: Rc<StructLayout>) -> Self {
        StructInstance {
            layout,
            native: OnceCell::new(),
            memory: RefCell::new(None),
            owned: RefCell::new(None),
        }
    }

    /// An instance over existing memory. The instance never releases it.
    pub fn wrap(layout: Rc<StructLayout>, memory: Rc<dyn MemoryRegion>) -> Self {
        let instance = Self::new(layout);
        *instance.memory.borrow_mut() = Some(memory);
        instance
    }

    pub fn layout(&self) -> &Rc<StructLayout> {
        &self.layout
    }

    /// Native size and alignment, computed once per instance.
    pub fn native_struct(&self) -> FfiResult<NativeStruct> {
        self.native.get_or_try_init(|| self.layout.native_struct()).copied()
    }

    pub fn size(&self) -> FfiResult<usize> {
        Ok(self.native_struct()?.size)
    }

    pub fn alignment(&self) -> FfiResult<usize> {
        Ok(self.native_struct()?.alignment)
    }

    /// The backing memory, allocating it if this instance has none yet.
    pub fn ensure_allocated(&self) -> FfiResult<Rc<dyn MemoryRegion>> {
        if let Some(memory) = self.memory.borrow().as_ref() {
            return Ok(memory.clone());
        }
        let native = self.native_struct()?;
        let hint = TypeHint::Struct {
            name: self.layout.name().to_string(),
            size: native.size.max(self.layout.size()),
        };
        let buffer = Rc::new(OwnedBuffer::new(hint, 1, true)?);
        log::debug!("allocated {} for struct {}", buffer, self.layout.name());
        let memory: Rc<dyn MemoryRegion> = buffer.clone();
        *self.owned.borrow_mut() = Some(buffer);
        *self.memory.borrow_mut() = Some(memory.clone());
        Ok(memory)
    }

    pub fn pointer(&self) -> FfiResult<Rc<dyn MemoryRegion>> {
        self.ensure_allocated()
    }

    pub fn get(&self, field: &str) -> FfiResult<FieldValue> {
        let field = self.layout.require_field(field)?;
        field.get(&self.ensure_allocated()?)
    }

    pub fn set(&self, field: &str, value: &Value) -> FfiResult<()> {
        let field = self.layout.require_field(field)?;
        field.put(&self.ensure_allocated()?, value)
    }

    /// Releases self-allocated memory. The next field access allocates
    /// afresh. Wrapped memory is left alone.
    pub fn free(&self) {
        if let Some(buffer) = self.owned.borrow_mut().take() {
            buffer.release();
            self.memory.borrow_mut().take();
            log::debug!("freed struct {}", self.layout.name());
        }
    }

    pub fn is_null(&self) -> bool {
        self.memory.borrow().as_ref().map_or(false, |memory| memory.is_null())
    }

    pub fn is_allocated(&self) -> bool {
        self.memory.borrow().is_some()
    }
}

impl PartialEq for StructInstance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.layout, &other.layout)
    }
}

impl fmt::Debug for StructInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructInstance")
            .field("layout", &self.layout.name())
            .field("address", &self.memory.borrow().as_ref().map(|memory| memory.address()))
            .field("owned", &self.owned.borrow().is_some())
            .finish()
    }
}
