//! In-memory link for exercising the driver without a radio.
//!
//! [`MockLink`] records every write and lets the caller inject notifications,
//! either by hand or automatically after each write.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::link::{BleLink, Connector};
use super::notification::NotificationSink;
use crate::core::{
    CharacteristicHandle, CharacteristicProperties, DeviceAddress, DriverError, GattProfile,
    GattUuid, RemoteCharacteristic,
};

/// Something that happened on a [`MockLink`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A write without response was accepted.
    Write(Vec<u8>),
    /// A notification was delivered to the sink.
    Notify(Vec<u8>),
}

#[derive(Debug)]
struct Inner {
    mtu: u16,
    profile: GattProfile,
    has_write: bool,
    write_properties: CharacteristicProperties,
    notify_properties: CharacteristicProperties,
    refuse_subscribe: bool,
    refuse_descriptor_write: bool,
    reject_writes: bool,
    reject_write_at: Option<usize>,
    auto_ack: Option<Vec<u8>>,
    sink: Option<NotificationSink>,
    write_attempts: usize,
    events: Vec<LinkEvent>,
    descriptor_writes: Vec<(CharacteristicHandle, GattUuid, Vec<u8>)>,
    disconnected: bool,
}

/// Cloneable in-memory [`BleLink`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MockLink {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    /// Handle assigned to the write characteristic.
    pub const WRITE_HANDLE: CharacteristicHandle = CharacteristicHandle(0x002A);
    /// Handle assigned to the notify characteristic.
    pub const NOTIFY_HANDLE: CharacteristicHandle = CharacteristicHandle(0x002D);

    /// A link exposing the default profile with MTU 23.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                mtu: 23,
                profile: GattProfile::default(),
                has_write: true,
                write_properties: CharacteristicProperties {
                    write_without_response: true,
                    notify: false,
                },
                notify_properties: CharacteristicProperties {
                    write_without_response: false,
                    notify: true,
                },
                refuse_subscribe: false,
                refuse_descriptor_write: false,
                reject_writes: false,
                reject_write_at: None,
                auto_ack: None,
                sink: None,
                write_attempts: 0,
                events: Vec::new(),
                descriptor_writes: Vec::new(),
                disconnected: false,
            })),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report `mtu` as the negotiated MTU.
    pub fn with_mtu(self, mtu: u16) -> Self {
        self.set_mtu(mtu);
        self
    }

    /// Expose characteristics under `profile` instead of the default one.
    pub fn with_profile(self, profile: GattProfile) -> Self {
        self.inner().profile = profile;
        self
    }

    /// Hide the write characteristic.
    pub fn without_write_characteristic(self) -> Self {
        self.inner().has_write = false;
        self
    }

    /// Override the write characteristic's properties.
    pub fn with_write_properties(self, properties: CharacteristicProperties) -> Self {
        self.inner().write_properties = properties;
        self
    }

    /// Override the notify characteristic's properties.
    pub fn with_notify_properties(self, properties: CharacteristicProperties) -> Self {
        self.inner().notify_properties = properties;
        self
    }

    /// Refuse subscriptions.
    pub fn refuse_subscribe(self) -> Self {
        self.inner().refuse_subscribe = true;
        self
    }

    /// Refuse descriptor writes.
    pub fn refuse_descriptor_write(self) -> Self {
        self.inner().refuse_descriptor_write = true;
        self
    }

    /// Answer every accepted write with a notification carrying `payload`.
    pub fn with_auto_ack(self, payload: &[u8]) -> Self {
        self.set_auto_ack(Some(payload.to_vec()));
        self
    }

    /// Refuse the write attempt with index `index` (0-based).
    pub fn reject_write_at(self, index: usize) -> Self {
        self.inner().reject_write_at = Some(index);
        self
    }

    /// Change the reported MTU.
    pub fn set_mtu(&self, mtu: u16) {
        self.inner().mtu = mtu;
    }

    /// Refuse or accept all further writes.
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner().reject_writes = reject;
    }

    /// Enable or disable automatic acknowledgments.
    pub fn set_auto_ack(&self, payload: Option<Vec<u8>>) {
        self.inner().auto_ack = payload;
    }

    /// Deliver a notification from the notify characteristic.
    ///
    /// Returns `false` if nothing is subscribed or the dispatcher is gone.
    pub fn notify(&self, payload: &[u8]) -> bool {
        self.notify_from(Self::NOTIFY_HANDLE, payload)
    }

    /// Deliver a notification claiming to come from `handle`.
    pub fn notify_from(&self, handle: CharacteristicHandle, payload: &[u8]) -> bool {
        let mut inner = self.inner();
        let delivered = inner
            .sink
            .as_ref()
            .is_some_and(|sink| sink.deliver(handle, payload));
        if delivered {
            inner.events.push(LinkEvent::Notify(payload.to_vec()));
        }
        delivered
    }

    /// Accepted writes, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner()
            .events
            .iter()
            .filter_map(|event| match event {
                LinkEvent::Write(bytes) => Some(bytes.clone()),
                LinkEvent::Notify(_) => None,
            })
            .collect()
    }

    /// Number of accepted writes.
    pub fn write_count(&self) -> usize {
        self.inner()
            .events
            .iter()
            .filter(|event| matches!(event, LinkEvent::Write(_)))
            .count()
    }

    /// Writes and notifications interleaved as they happened.
    pub fn events(&self) -> Vec<LinkEvent> {
        self.inner().events.clone()
    }

    /// Descriptor writes, in order.
    pub fn descriptor_writes(&self) -> Vec<(CharacteristicHandle, GattUuid, Vec<u8>)> {
        self.inner().descriptor_writes.clone()
    }

    /// Check if a sink has been registered.
    pub fn is_subscribed(&self) -> bool {
        self.inner().sink.is_some()
    }

    /// Check if [`BleLink::disconnect`] was called.
    pub fn is_disconnected(&self) -> bool {
        self.inner().disconnected
    }
}

impl BleLink for MockLink {
    fn mtu(&self) -> u16 {
        self.inner().mtu
    }

    fn characteristic(
        &self,
        service: GattUuid,
        characteristic: GattUuid,
    ) -> Option<RemoteCharacteristic> {
        let inner = self.inner();
        if service != inner.profile.service {
            return None;
        }
        if characteristic == inner.profile.write && inner.has_write {
            return Some(RemoteCharacteristic {
                handle: Self::WRITE_HANDLE,
                properties: inner.write_properties,
            });
        }
        if characteristic == inner.profile.notify {
            return Some(RemoteCharacteristic {
                handle: Self::NOTIFY_HANDLE,
                properties: inner.notify_properties,
            });
        }
        None
    }

    fn write_without_response(&self, handle: CharacteristicHandle, bytes: &[u8]) -> bool {
        let mut inner = self.inner();
        let attempt = inner.write_attempts;
        inner.write_attempts += 1;

        if handle != Self::WRITE_HANDLE
            || inner.disconnected
            || inner.reject_writes
            || inner.reject_write_at == Some(attempt)
        {
            return false;
        }
        inner.events.push(LinkEvent::Write(bytes.to_vec()));

        if let Some(payload) = inner.auto_ack.clone() {
            let delivered = inner
                .sink
                .as_ref()
                .is_some_and(|sink| sink.deliver(Self::NOTIFY_HANDLE, &payload));
            if delivered {
                inner.events.push(LinkEvent::Notify(payload));
            }
        }
        true
    }

    fn write_descriptor(
        &self,
        handle: CharacteristicHandle,
        descriptor: GattUuid,
        bytes: &[u8],
    ) -> bool {
        let mut inner = self.inner();
        if inner.refuse_descriptor_write {
            return false;
        }
        inner
            .descriptor_writes
            .push((handle, descriptor, bytes.to_vec()));
        true
    }

    fn subscribe(&self, handle: CharacteristicHandle, sink: NotificationSink) -> bool {
        let mut inner = self.inner();
        if inner.refuse_subscribe || handle != Self::NOTIFY_HANDLE {
            return false;
        }
        inner.sink = Some(sink);
        true
    }

    fn disconnect(&self) {
        let mut inner = self.inner();
        inner.disconnected = true;
        inner.sink = None;
    }
}

/// [`Connector`] handing out a prepared [`MockLink`].
#[derive(Debug, Default)]
pub struct MockConnector {
    link: Option<MockLink>,
    attempts: Mutex<Vec<DeviceAddress>>,
}

impl MockConnector {
    /// Every connect succeeds with a clone of `link`.
    pub fn new(link: MockLink) -> Self {
        Self {
            link: Some(link),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Every connect fails.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Addresses passed to `connect`, in order.
    pub fn attempts(&self) -> Vec<DeviceAddress> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    async fn connect(&self, address: &DeviceAddress) -> Result<MockLink, DriverError> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*address);
        self.link
            .clone()
            .ok_or_else(|| DriverError::TransportUnavailable(format!("{address} unreachable")))
    }
}
