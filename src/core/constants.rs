//! Link and timing constants.
//!
//! Timing values are defaults; every one of them can be overridden through
//! the driver configuration.

use std::time::Duration;

// =============================================================================
// ATT / GATT
// =============================================================================

/// Bytes of every ATT write reserved for the link-layer header
/// (opcode + attribute handle).
pub const ATT_HEADER_LEN: usize = 3;

/// Smallest ATT MTU a compliant link can negotiate.
pub const ATT_MIN_MTU: u16 = 23;

/// Chunk size used when the MTU is unknown or too small.
pub const FALLBACK_CHUNK_SIZE: usize = 20;

/// Client Characteristic Configuration Descriptor.
pub const CCCD_UUID: u16 = 0x2902;

/// CCCD value enabling notifications (little endian `0x0001`).
pub const CCCD_ENABLE_NOTIFICATIONS: [u8; 2] = [0x01, 0x00];

// =============================================================================
// DEFAULT PROFILE
// =============================================================================

/// Primary service exposing the command pipe.
pub const DEFAULT_SERVICE_UUID: u16 = 0xABF0;

/// Characteristic accepting writes without response.
pub const DEFAULT_WRITE_UUID: u16 = 0xABF1;

/// Characteristic emitting acknowledgments and status notifications.
pub const DEFAULT_NOTIFY_UUID: u16 = 0xABF2;

// =============================================================================
// TIMING
// =============================================================================

/// Time to wait for a notification after each chunk.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between consecutive chunks so the peer's receive buffer drains.
pub const DEFAULT_CHUNK_SPACING: Duration = Duration::from_millis(5);

/// Pause between a frame-advance notification and the next frame write.
pub const DEFAULT_FRAME_SETTLE_DELAY: Duration = Duration::from_millis(50);

// =============================================================================
// QUEUES
// =============================================================================

/// Depth of the command queue feeding the driver task.
pub const DEFAULT_COMMAND_QUEUE_DEPTH: usize = 32;
