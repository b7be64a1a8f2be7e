//! Replay driver and its task handles.
//!
//! [`Driver`] runs buffer transfers and frame jobs on one session.
//! [`Driver::spawn`] moves it onto its own task behind a [`DriverHandle`].

mod config;
mod driver;
mod handle;

pub use config::*;
pub use driver::*;
pub use handle::*;
