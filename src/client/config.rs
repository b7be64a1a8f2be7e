//! Driver configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    AcceptAny, AckValidator, DEFAULT_ACK_TIMEOUT, DEFAULT_CHUNK_SPACING,
    DEFAULT_COMMAND_QUEUE_DEPTH, DEFAULT_FRAME_SETTLE_DELAY, GattProfile,
};
use crate::transport::SessionConfig;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Characteristic lookup and subscription options.
    pub session: SessionConfig,

    /// How long to wait for the acknowledgment of each chunk.
    pub ack_timeout: Duration,

    /// Pause between consecutive chunks of a buffer transfer.
    pub chunk_spacing: Duration,

    /// Pause between a frame-advance notification and the next frame write.
    pub frame_settle_delay: Duration,

    /// Abort a frame job when no notification arrives within this time.
    ///
    /// `None` waits indefinitely.
    pub frame_timeout: Option<Duration>,

    /// Capacity of the command queue feeding the driver task.
    pub command_queue_depth: usize,

    /// Decides whether a notification payload reports success.
    pub ack_validator: Arc<dyn AckValidator>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            chunk_spacing: DEFAULT_CHUNK_SPACING,
            frame_settle_delay: DEFAULT_FRAME_SETTLE_DELAY,
            frame_timeout: None,
            command_queue_depth: DEFAULT_COMMAND_QUEUE_DEPTH,
            ack_validator: Arc::new(AcceptAny),
        }
    }
}

impl DriverConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::new()
    }
}

/// Builder for [`DriverConfig`].
///
/// ```
/// use std::time::Duration;
/// use gatt_replay::client::DriverConfigBuilder;
/// use gatt_replay::core::StatusByte;
///
/// let config = DriverConfigBuilder::new()
///     .ack_timeout(Duration::from_millis(250))
///     .frame_timeout(Duration::from_secs(2))
///     .ack_validator(StatusByte::new(1, 0x00))
///     .build();
/// assert_eq!(config.ack_timeout, Duration::from_millis(250));
/// assert_eq!(config.frame_timeout, Some(Duration::from_secs(2)));
/// ```
#[derive(Debug)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: DriverConfig::default(),
        }
    }

    /// Set the service and characteristic UUIDs.
    pub fn profile(mut self, profile: GattProfile) -> Self {
        self.config.session.profile = profile;
        self
    }

    /// Write the CCC descriptor explicitly before subscribing.
    pub fn explicit_cccd(mut self, enabled: bool) -> Self {
        self.config.session.explicit_cccd = enabled;
        self
    }

    /// Set the per-chunk acknowledgment timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the pause between chunks.
    pub fn chunk_spacing(mut self, spacing: Duration) -> Self {
        self.config.chunk_spacing = spacing;
        self
    }

    /// Set the pause before each frame after the first.
    pub fn frame_settle_delay(mut self, delay: Duration) -> Self {
        self.config.frame_settle_delay = delay;
        self
    }

    /// Abort frame jobs whose peer stays silent for `timeout`.
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.config.frame_timeout = Some(timeout);
        self
    }

    /// Set the command queue capacity. Zero is raised to one.
    pub fn command_queue_depth(mut self, depth: usize) -> Self {
        self.config.command_queue_depth = depth.max(1);
        self
    }

    /// Set the acknowledgment payload contract.
    pub fn ack_validator(mut self, validator: impl AckValidator) -> Self {
        self.config.ack_validator = Arc::new(validator);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DriverConfig {
        self.config
    }
}

impl Default for DriverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
