//! Struct layouts over marrow memory.
//!
//! A [`StructLayout`] only records offsets; [`LayoutBuilder`] is the usual
//! way to compute C offsets for a field list. [`StructInstance`] binds a
//! layout to memory and [`InlineArrayView`] exposes array fields element by
//! element.

pub mod array;
pub mod builder;
pub mod by_value;
pub mod error;
pub mod field;
pub mod instance;
pub mod layout;

pub use array::InlineArrayView;
pub use builder::LayoutBuilder;
pub use by_value::StructByValue;
pub use error::LayoutError;
pub use field::{Field, FieldValue};
pub use instance::StructInstance;
pub use layout::{NativeStruct, StructLayout};
