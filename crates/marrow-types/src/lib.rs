//! Native type registry and marshalling strategies.
//!
//! Every other marrow crate reads and writes native values through the
//! descriptors defined here.

pub mod abi;
pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod mapped;
pub mod strategy;
pub mod value;

pub use abi::AbiTag;
pub use catalog::{catalog, find_type, TypeArg, TypeCatalog};
pub use descriptor::{TypeDescriptor, TypeKind};
pub use error::{FfiError, FfiResult};
pub use mapped::DataConverter;
pub use strategy::MarshalStrategy;
pub use value::{Address, Value};
