use std::rc::Rc;

use marrow_memory::MemoryRegion;
use marrow_types::{FfiError, FfiResult, MarshalStrategy, TypeDescriptor, Value};

use crate::array::InlineArrayView;
use crate::by_value::StructByValue;
use crate::instance::StructInstance;
use crate::layout::StructLayout;

/// One named member of a struct layout.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    ty: TypeDescriptor,
    offset: usize,
    nested: Option<Rc<StructLayout>>,
}

/// What reading a field produces.
#[derive(Debug)]
pub enum FieldValue {
    Scalar(Value),
    /// Array fields read as a live view into the struct's memory.
    Array(InlineArrayView),
    /// Nested struct fields read as an instance over the enclosing memory.
    Struct(StructInstance),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<Value> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<InlineArrayView> {
        match self {
            FieldValue::Array(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_struct(self) -> Option<StructInstance> {
        match self {
            FieldValue::Struct(instance) => Some(instance),
            _ => None,
        }
    }
}

impl Field {
    /// A field of type `ty` at `offset`. Array descriptors (see
    /// [`TypeDescriptor::array`]) make an array field.
    pub fn new(name: impl Into<String>, ty: TypeDescriptor, offset: usize) -> Self {
        Field { name: name.into(), ty, offset, nested: None }
    }

    /// An array field of `length` elements of `element`.
    pub fn array(name: impl Into<String>, element: TypeDescriptor, length: usize, offset: usize) -> Self {
        Self::new(name, TypeDescriptor::array(element, length), offset)
    }

    /// A struct stored inline at `offset`.
    pub fn nested(name: impl Into<String>, by_value: &StructByValue, offset: usize) -> Self {
        Field {
            name: name.into(),
            ty: by_value.descriptor().clone(),
            offset,
            nested: Some(by_value.struct_layout().clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.ty.size()
    }

    pub fn is_array(&self) -> bool {
        self.ty.as_array().is_some()
    }

    /// Layout of a nested struct field.
    pub fn nested_layout(&self) -> Option<&Rc<StructLayout>> {
        self.nested.as_ref()
    }

    /// The element type and how many times it repeats: `(ty, 1)` for scalars.
    pub fn element(&self) -> (&TypeDescriptor, usize) {
        self.ty.as_array().unwrap_or((&self.ty, 1))
    }

    pub fn get(&self, memory: &Rc<dyn MemoryRegion>) -> FfiResult<FieldValue> {
        if let Some(layout) = &self.nested {
            let view = memory.slice(self.offset as i64, self.size())?;
            return Ok(FieldValue::Struct(StructInstance::wrap(layout.clone(), Rc::new(view))));
        }
        match self.ty.as_array() {
            Some((element, length)) => Ok(FieldValue::Array(InlineArrayView::new(
                memory.clone(),
                element.clone(),
                self.offset,
                length,
            ))),
            None => memory.get_typed(&self.ty, self.offset as i64).map(FieldValue::Scalar),
        }
    }

    /// Array fields and struct-typed fields are written member by member,
    /// never as a whole.
    pub fn put(&self, memory: &Rc<dyn MemoryRegion>, value: &Value) -> FfiResult<()> {
        if self.is_array() {
            return Err(FfiError::ArrayFieldNotWritable { field: self.name.clone(), offset: self.offset });
        }
        if self.nested.is_some() || matches!(self.ty.strategy(), MarshalStrategy::Void) {
            return Err(FfiError::StructFieldNotWritable { field: self.name.clone(), offset: self.offset });
        }
        memory.put_typed(&self.ty, self.offset as i64, value)
    }
}
