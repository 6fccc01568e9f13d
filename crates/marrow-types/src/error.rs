use miette::Diagnostic;
use thiserror::Error;

/// Failures raised by the FFI core.
///
/// Every variant carries the offset, size, address or type involved so a
/// native-layer bug can be traced from the message alone.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum FfiError {
    #[error("Attempt to access a null pointer (offset={offset}, size={size})")]
    #[diagnostic(code(marrow::null_pointer_access))]
    NullPointerAccess { offset: i64, size: usize },

    #[error("Memory access offset={offset} size={size} is out of bounds of a {limit} byte region")]
    #[diagnostic(code(marrow::out_of_bounds))]
    OutOfBounds { offset: i64, size: i64, limit: usize },

    #[error("Range error: source offset={offset} length={length} does not fit a {available} byte source")]
    #[diagnostic(code(marrow::range_error))]
    RangeError { offset: i64, length: i64, available: usize },

    #[error("Need a type name, a byte size or a struct as type hint, got {0}")]
    #[diagnostic(code(marrow::invalid_type_hint))]
    InvalidTypeHint(String),

    #[error("Invalid {position} type ({found})")]
    #[diagnostic(code(marrow::invalid_argument_type))]
    InvalidArgumentType { position: String, found: String },

    #[error("Cannot set array field `{field}` at offset {offset}; write its elements instead")]
    #[diagnostic(code(marrow::array_field_not_writable))]
    ArrayFieldNotWritable { field: String, offset: usize },

    #[error("Cannot set struct field `{field}` at offset {offset}; write its members instead")]
    #[diagnostic(code(marrow::struct_field_not_writable))]
    StructFieldNotWritable { field: String, offset: usize },

    #[error("Native layer failed to prepare call interface {signature}: {reason}")]
    #[diagnostic(code(marrow::call_preparation_failed))]
    CallPreparationFailed { signature: String, reason: String },

    #[error("Native layer failed to prepare struct type {layout}: {reason}")]
    #[diagnostic(code(marrow::struct_preparation_failed))]
    StructPreparationFailed { layout: String, reason: String },

    #[error("Unknown native type `{0}`")]
    #[diagnostic(code(marrow::unknown_type))]
    UnknownType(String),

    #[error("Mapped type converter does not implement `{0}`")]
    #[diagnostic(code(marrow::mapped_type_contract_violation))]
    MappedTypeContractViolation(&'static str),

    #[error("Memory at address {address:#x} was already released by its owner")]
    #[diagnostic(code(marrow::use_after_release))]
    UseAfterRelease { address: usize },

    #[error("Cannot convert {value} into {target}")]
    #[diagnostic(code(marrow::conversion))]
    Conversion { value: String, target: &'static str },

    #[error("No field `{field}` in struct layout [{members}]")]
    #[diagnostic(code(marrow::unknown_field))]
    UnknownField { field: String, members: String },

    #[error("Invalid struct layout: {0}")]
    #[diagnostic(code(marrow::invalid_layout))]
    InvalidLayout(String),

    #[error("Allocation of {size} bytes failed")]
    #[diagnostic(code(marrow::allocation_failed))]
    AllocationFailed { size: usize },
}

pub type FfiResult<T> = Result<T, FfiError>;

impl FfiError {
    pub fn out_of_bounds(offset: i64, size: usize, limit: usize) -> Self {
        FfiError::OutOfBounds { offset, size: size as i64, limit }
    }
}
