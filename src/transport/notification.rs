//! Notification delivery from the link callback to the driver.
//!
//! The link's callback runs in whatever context the BLE stack chooses. It
//! only pushes a [`Notification`] into an unbounded channel through a
//! [`NotificationSink`]; the [`NotificationDispatcher`] on the other end is
//! owned by the driver task, which keeps every piece of mutable state
//! (ack flag, last payload, frame cursor) on a single task.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::core::CharacteristicHandle;

/// One inbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    characteristic: CharacteristicHandle,
    payload: Vec<u8>,
    received_at: Instant,
}

impl Notification {
    /// Create a notification stamped with the current time.
    pub fn new(characteristic: CharacteristicHandle, payload: Vec<u8>) -> Self {
        Self {
            characteristic,
            payload,
            received_at: Instant::now(),
        }
    }

    /// Characteristic that emitted it.
    pub fn characteristic(&self) -> CharacteristicHandle {
        self.characteristic
    }

    /// Raw payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume and return the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// When the sink accepted it.
    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

/// Callback-side handle handed to [`BleLink::subscribe`](super::BleLink::subscribe).
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    /// Forward a notification. Never blocks.
    ///
    /// Returns `false` once the dispatcher has been dropped.
    pub fn deliver(&self, characteristic: CharacteristicHandle, payload: &[u8]) -> bool {
        self.tx
            .send(Notification::new(characteristic, payload.to_vec()))
            .is_ok()
    }

    /// Check if the dispatcher is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Acknowledgment bookkeeping for the chunk currently in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckState {
    expected: bool,
    received: bool,
    last_payload: Vec<u8>,
}

impl AckState {
    /// Clear the flag and payload before a write.
    fn arm(&mut self) {
        self.expected = true;
        self.received = false;
        self.last_payload.clear();
    }

    fn record(&mut self, payload: &[u8]) {
        self.received = true;
        self.last_payload.clear();
        self.last_payload.extend_from_slice(payload);
    }

    /// Check if a write is waiting for its acknowledgment.
    pub fn is_expected(&self) -> bool {
        self.expected
    }

    /// Check if a notification arrived since the last arm.
    pub fn is_received(&self) -> bool {
        self.received
    }

    /// Payload of the last notification.
    pub fn last_payload(&self) -> &[u8] {
        &self.last_payload
    }

    fn settle(&mut self) {
        self.expected = false;
    }
}

/// Counters and last payload of a [`NotificationDispatcher`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationStats {
    /// Notifications accepted from the notify characteristic.
    pub delivered: u64,
    /// Notifications dropped because they came from another characteristic.
    pub ignored: u64,
    /// Payload of the most recently accepted notification since the last arm.
    pub last_payload: Vec<u8>,
}

/// Receives notifications for one session and keeps the [`AckState`].
#[derive(Debug)]
pub struct NotificationDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    source: CharacteristicHandle,
    ack: AckState,
    delivered: u64,
    ignored: u64,
}

impl NotificationDispatcher {
    /// Create a dispatcher accepting notifications from `source`, and the
    /// sink that feeds it.
    pub fn channel(source: CharacteristicHandle) -> (Self, NotificationSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            rx,
            source,
            ack: AckState::default(),
            delivered: 0,
            ignored: 0,
        };
        (dispatcher, NotificationSink { tx })
    }

    /// Reset the ack state and drop notifications queued before this point.
    ///
    /// Returns the number of stale notifications discarded.
    pub fn arm(&mut self) -> usize {
        let mut stale = 0;
        while let Ok(notification) = self.rx.try_recv() {
            trace!(
                payload = %hex::encode(notification.payload()),
                "discarding stale notification"
            );
            stale += 1;
        }
        if stale > 0 {
            debug!(stale, "discarded notifications queued before write");
        }
        self.ack.arm();
        stale
    }

    /// Wait for the next notification from the notify characteristic.
    ///
    /// Notifications from other characteristics are dropped. Returns `None`
    /// when every sink is gone. Cancel safe.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            let notification = self.rx.recv().await?;
            if let Some(notification) = self.accept(notification) {
                return Some(notification);
            }
        }
    }

    fn accept(&mut self, notification: Notification) -> Option<Notification> {
        if notification.characteristic() != self.source {
            self.ignored += 1;
            warn!(
                characteristic = notification.characteristic().0,
                payload = %hex::encode(notification.payload()),
                "ignoring notification from foreign characteristic"
            );
            return None;
        }

        self.delivered += 1;
        self.ack.record(notification.payload());
        debug!(
            payload = %hex::encode(notification.payload()),
            "notification"
        );
        Some(notification)
    }

    /// Current ack bookkeeping.
    pub fn ack_state(&self) -> &AckState {
        &self.ack
    }

    /// Mark the pending acknowledgment as consumed.
    pub fn settle(&mut self) {
        self.ack.settle();
    }

    /// Characteristic this dispatcher listens to.
    pub fn source(&self) -> CharacteristicHandle {
        self.source
    }

    /// Notifications accepted so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Notifications dropped because they came from another characteristic.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Snapshot of the counters and the last payload.
    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            delivered: self.delivered,
            ignored: self.ignored,
            last_payload: self.ack.last_payload.clone(),
        }
    }
}
