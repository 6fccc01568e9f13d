use miette::Diagnostic;
use thiserror::Error;

use marrow_types::FfiError;

/// Errors from computing a C layout for a field list.
#[derive(Error, Diagnostic, Debug)]
pub enum LayoutError {
    #[error("Layout computation failed: {0}")]
    #[diagnostic(code(marrow::layout::repc))]
    RepcError(#[from] repc::Error),

    #[error("No C layout rules are known for the host target")]
    #[diagnostic(code(marrow::layout::no_host_target))]
    NoHostTarget,

    #[error("Type {0} has no C layout")]
    #[diagnostic(code(marrow::layout::unsupported_type))]
    UnsupportedType(String),

    #[error("Computed layout of {layout} has no offset for field `{field}`")]
    #[diagnostic(code(marrow::layout::missing_offset))]
    MissingOffset { layout: String, field: String },

    #[error("Computed layout of {0} is not a record")]
    #[diagnostic(code(marrow::layout::not_a_record))]
    NotARecord(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ffi(#[from] FfiError),
}
