//! Transport layer: session, fragmentation, and notification dispatch.
//!
//! This module sits between the BLE stack (reached through [`BleLink`]) and
//! the driver. It provides:
//!
//! - **Session bootstrap**: [`TransportSession`] resolves the write and notify
//!   characteristics and subscribes to notifications
//! - **Fragmentation**: [`split`] cuts buffers into MTU-bounded [`Chunk`]s
//! - **Notification dispatch**: [`NotificationDispatcher`] moves notifications
//!   from the link callback onto the driver task and keeps the [`AckState`]
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Driver / Frame Sequencer        │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   session, chunker, dispatcher          │
//! ├─────────────────────────────────────────┤
//! │         BleLink (BLE stack)             │
//! └─────────────────────────────────────────┘
//! ```

mod chunk;
mod link;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod notification;
mod session;

pub use chunk::*;
pub use link::*;
pub use notification::*;
pub use session::*;
