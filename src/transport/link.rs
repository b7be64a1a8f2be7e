//! The radio-facing collaborator.
//!
//! A BLE stack is plugged in by implementing [`BleLink`] for a connected
//! peripheral and [`Connector`] for the code that establishes connections.
//! The driver only needs the negotiated MTU, characteristic lookup,
//! unacknowledged writes, one descriptor write, and a subscription.

use std::future::Future;

use super::notification::NotificationSink;
use crate::core::{
    CharacteristicHandle, DeviceAddress, DriverError, GattUuid, RemoteCharacteristic,
};

/// A connected BLE link.
///
/// Methods return `bool` where the underlying stacks do: the driver turns a
/// refusal into the matching [`DriverError`].
pub trait BleLink: Send + 'static {
    /// Currently negotiated ATT MTU, or 0 if unknown.
    fn mtu(&self) -> u16;

    /// Look up a characteristic inside a service.
    fn characteristic(
        &self,
        service: GattUuid,
        characteristic: GattUuid,
    ) -> Option<RemoteCharacteristic>;

    /// Write without response. Returns `false` if the stack refused the write.
    fn write_without_response(&self, handle: CharacteristicHandle, bytes: &[u8]) -> bool;

    /// Write a descriptor of a characteristic, waiting for the write response.
    fn write_descriptor(
        &self,
        handle: CharacteristicHandle,
        descriptor: GattUuid,
        bytes: &[u8],
    ) -> bool;

    /// Route notifications of `handle` into `sink`.
    ///
    /// The callback side must stay cheap: it only calls
    /// [`NotificationSink::deliver`].
    fn subscribe(&self, handle: CharacteristicHandle, sink: NotificationSink) -> bool;

    /// Tear the link down.
    fn disconnect(&self) {}
}

/// Establishes links to peripherals.
pub trait Connector {
    /// The link type produced on success.
    type Link: BleLink;

    /// Connect to `address`.
    fn connect(
        &self,
        address: &DeviceAddress,
    ) -> impl Future<Output = Result<Self::Link, DriverError>> + Send;
}
