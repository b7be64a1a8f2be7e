//! Error types for the replay driver.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the peripheral.
///
/// Every failure is local to one chunk or frame and aborts the enclosing
/// operation. Nothing is retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A required characteristic is missing, unsuitable, or the link is gone.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The link refused a write without response.
    #[error("write of {len} bytes rejected by link")]
    WriteRejected {
        /// Length of the refused write.
        len: usize,
    },

    /// No notification arrived within the timeout.
    #[error("no acknowledgment within {timeout:?}")]
    AckTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A notification arrived but its payload reports failure.
    #[error("acknowledgment rejected (status {code:?}, payload {})", hex::encode(.payload))]
    AckRejected {
        /// Status byte reported by the peer, if the payload carried one.
        code: Option<u8>,
        /// Raw notification payload.
        payload: Vec<u8>,
    },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// A frame job is already running on this session.
    #[error("a frame job is already in progress")]
    JobInProgress,

    /// The session is owned by a frame job; buffer transfers must wait.
    #[error("session busy with a frame job")]
    Busy,

    /// A job was started with no frames.
    #[error("frame sequence is empty")]
    EmptySequence,

    /// The driver task has stopped.
    #[error("driver closed")]
    DriverClosed,
}

impl DriverError {
    /// Check if this error leaves the session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::TransportUnavailable(_) | DriverError::DriverClosed
        )
    }

    /// Check if this error was caused by the peer (or its silence) rather
    /// than by the local link or the caller.
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            DriverError::AckTimeout { .. } | DriverError::AckRejected { .. }
        )
    }
}

/// A buffer transfer stopped at a chunk.
///
/// Chunks before `offset` were acknowledged; nothing is rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("chunk at offset {offset} failed: {reason}")]
pub struct TransferFailure {
    /// Byte offset of the failing chunk.
    pub offset: usize,
    /// Why it failed.
    #[source]
    pub reason: DriverError,
}

impl TransferFailure {
    /// Create a failure for the chunk starting at `offset`.
    pub fn new(offset: usize, reason: DriverError) -> Self {
        Self { offset, reason }
    }
}

/// A frame job was aborted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("frame job aborted at frame {frame_index}: {reason}")]
pub struct JobFailure {
    /// Index of the frame that was being written or awaited.
    pub frame_index: usize,
    /// Why the job stopped.
    #[source]
    pub reason: DriverError,
}

impl JobFailure {
    /// Create a failure at `frame_index`.
    pub fn new(frame_index: usize, reason: DriverError) -> Self {
        Self {
            frame_index,
            reason,
        }
    }
}

/// Errors parsing a device address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    /// Wrong number of colon-separated octets.
    #[error("expected 6 octets, got {0}")]
    OctetCount(usize),

    /// An octet is not two hex digits.
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

/// Errors loading a frame catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A line is not valid hex.
    #[error("invalid hex on line {line}: {message}")]
    InvalidHex {
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        message: String,
    },

    /// The catalog contains no frames.
    #[error("frame catalog is empty")]
    Empty,
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
