use std::fmt;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{FfiError, FfiResult};
use crate::value::Value;

type ConvertFn = Arc<dyn Fn(&Value) -> FfiResult<Value> + Send + Sync>;

/// Host-supplied conversion plugged into a mapped type.
///
/// The host fills in whichever capabilities its converter object exposes;
/// [`DataConverter::into_type`] refuses converters missing any of them.
#[derive(Clone, Default)]
pub struct DataConverter {
    native_type: Option<TypeDescriptor>,
    to_native: Option<ConvertFn>,
    from_native: Option<ConvertFn>,
}

impl DataConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_type(mut self, ty: TypeDescriptor) -> Self {
        self.native_type = Some(ty);
        self
    }

    pub fn to_native_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> FfiResult<Value> + Send + Sync + 'static,
    {
        self.to_native = Some(Arc::new(f));
        self
    }

    pub fn from_native_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> FfiResult<Value> + Send + Sync + 'static,
    {
        self.from_native = Some(Arc::new(f));
        self
    }

    pub fn to_native(&self, value: &Value) -> FfiResult<Value> {
        let f = self
            .to_native
            .as_ref()
            .ok_or(FfiError::MappedTypeContractViolation("to_native"))?;
        f(value)
    }

    pub fn from_native(&self, value: &Value) -> FfiResult<Value> {
        let f = self
            .from_native
            .as_ref()
            .ok_or(FfiError::MappedTypeContractViolation("from_native"))?;
        f(value)
    }

    /// Validates the converter and builds the mapped type descriptor. The
    /// result stores its values exactly like its native type does.
    pub fn into_type(self) -> FfiResult<TypeDescriptor> {
        let delegate = self
            .native_type
            .clone()
            .ok_or(FfiError::MappedTypeContractViolation("native_type"))?;
        if self.to_native.is_none() {
            return Err(FfiError::MappedTypeContractViolation("to_native"));
        }
        if self.from_native.is_none() {
            return Err(FfiError::MappedTypeContractViolation("from_native"));
        }
        Ok(TypeDescriptor::mapped(self, delegate))
    }
}

impl fmt::Debug for DataConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConverter")
            .field("native_type", &self.native_type.as_ref().map(|t| t.name().to_string()))
            .field("to_native", &self.to_native.is_some())
            .field("from_native", &self.from_native.is_some())
            .finish()
    }
}
