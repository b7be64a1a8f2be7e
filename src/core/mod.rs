//! Core types, constants, and the acknowledgment contract.
//!
//! This module has no I/O dependencies. It defines the error taxonomy shared
//! by every layer, the timing defaults, and the GATT identifiers used to
//! locate the write and notify characteristics.

mod constants;
mod error;
mod gatt;
mod traits;

pub use constants::*;
pub use error::*;
pub use gatt::*;
pub use traits::*;
