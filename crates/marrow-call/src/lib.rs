//! Dynamic native calls.
//!
//! A [`CallDescriptorBuilder`] turns a runtime signature into an immutable
//! [`CallDescriptor`]; an [`ExchangeBuffer`] marshals one call's arguments
//! and result through it.

pub mod descriptor;
pub mod exchange;
pub mod options;

pub use descriptor::{BuilderState, CallDescriptor, CallDescriptorBuilder, ExchangeLayout, EXCHANGE_ALIGN};
pub use exchange::ExchangeBuffer;
pub use options::{CallOptions, Convention, OptionsError};
