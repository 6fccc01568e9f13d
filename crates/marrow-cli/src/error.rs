use miette::Diagnostic;
use thiserror::Error;

use marrow_call::OptionsError;
use marrow_layout::LayoutError;
use marrow_types::FfiError;

/// Errors surfaced by the `marrow` binary.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Invalid field spec `{spec}`")]
    #[diagnostic(code(marrow::cli::field_spec), help("fields are written name:type or name:type:count"))]
    FieldSpec { spec: String },

    #[error("Invalid element count in field spec `{spec}`")]
    #[diagnostic(code(marrow::cli::field_count))]
    FieldCount {
        spec: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Failed to load call options")]
    #[diagnostic(code(marrow::cli::options))]
    Options(#[from] OptionsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ffi(#[from] FfiError),
}
