pub mod cif;
pub mod layout;
pub mod types;

pub use cif::handle_cif;
pub use layout::handle_layout;
pub use types::handle_types;
