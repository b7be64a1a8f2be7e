//! # gatt-replay
//!
//! Replay and transfer driver for BLE peripherals that speak a
//! write-without-response / notify command pipe.
//!
//! The driver sends data to the peripheral in two ways:
//!
//! - **Buffer transfers**: a large buffer is cut into MTU-sized chunks and
//!   every chunk waits for an acknowledging notification before the next one
//!   is written
//! - **Frame jobs**: a sequence of pre-built frames is replayed one frame per
//!   notification, with a short settle delay between frames
//!
//! Only one of them owns a session at a time, so every notification has
//! exactly one meaning.
//!
//! ## Feature Flags
//!
//! - `transport` (default): Session bootstrap, chunking, notification dispatch
//! - `client` (default): [`Driver`](client::Driver) and its task handles
//! - `mock`: In-memory [`MockLink`](transport::mock::MockLink) for tests
//!
//! ## Modules
//!
//! - [`core`]: Constants, errors, GATT identifiers, ack contract (always included)
//! - [`job`]: Frames and the frame sequencer (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`client`]: Driver and handles (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gatt_replay::prelude::*;
//! # async fn run<L: BleLink>(link: L) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let config = DriverConfigBuilder::new()
//!     .ack_validator(StatusByte::new(1, 0x00))
//!     .build();
//! let driver = Driver::open(link, config)?.spawn();
//!
//! driver.send_large_buffer(vec![0u8; 4096]).await?;
//!
//! let frames = FrameSequence::from_hex_lines("66 35 00 1b\n66 2f 00 1b\n")?;
//! let job = driver.start_job(frames).await?;
//! let report = job.wait().await?;
//! println!("{} frames sent", report.frames);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Frames and sequencing (always included)
pub mod job;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Driver API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use crate::core::*;

    // Frames and sequencing
    pub use crate::job::{Frame, FrameSequence, FrameSequencer, JobId, JobState};

    // Transport types (when enabled)
    #[cfg(feature = "transport")]
    pub use crate::transport::{
        BleLink, Connector, Notification, NotificationDispatcher, NotificationSink,
        SessionConfig, TransportSession,
    };

    // Driver types (when enabled)
    #[cfg(feature = "client")]
    pub use crate::client::{
        Driver, DriverConfig, DriverConfigBuilder, DriverHandle, JobHandle, JobReport,
        JobStatus, TransferReport,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{DriverError, DriverResult, JobFailure, TransferFailure};

#[cfg(feature = "client")]
pub use client::{Driver, DriverHandle, JobHandle};
