//! Transport session: one connected link with its discovered characteristics.

use tracing::{debug, info, warn};

use super::link::{BleLink, Connector};
use super::notification::NotificationDispatcher;
use crate::core::{
    CCCD_ENABLE_NOTIFICATIONS, CCCD_UUID, CharacteristicHandle, DeviceAddress, DriverError,
    DriverResult, GattProfile, GattUuid, RemoteCharacteristic,
};

/// How a session is set up on top of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    /// Where the write and notify characteristics live.
    pub profile: GattProfile,
    /// Write the CCC descriptor with a write request before subscribing.
    ///
    /// Some stacks only arm notifications on the peer once the descriptor
    /// write has been confirmed.
    pub explicit_cccd: bool,
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Characteristics discovered, notifications subscribed.
    Ready,
    /// Link torn down.
    Closed,
}

/// A connected link with its write and notify characteristics resolved.
///
/// Owns the link. The MTU is read from the link on every call since stacks
/// may renegotiate it after connecting.
#[derive(Debug)]
pub struct TransportSession<L: BleLink> {
    link: L,
    address: Option<DeviceAddress>,
    config: SessionConfig,
    write: CharacteristicHandle,
    notify: CharacteristicHandle,
    phase: SessionPhase,
}

impl<L: BleLink> TransportSession<L> {
    /// Connect to `address` and open a session on the resulting link.
    pub async fn connect<C>(
        connector: &C,
        address: DeviceAddress,
        config: SessionConfig,
    ) -> DriverResult<(Self, NotificationDispatcher)>
    where
        C: Connector<Link = L>,
    {
        info!(%address, "connecting");
        let link = connector.connect(&address).await.inspect_err(|e| {
            warn!(%address, error = %e, "connect failed");
        })?;

        let (mut session, dispatcher) = Self::open(link, config)?;
        session.address = Some(address);
        Ok((session, dispatcher))
    }

    /// Resolve characteristics on an already connected link and subscribe to
    /// notifications.
    pub fn open(link: L, config: SessionConfig) -> DriverResult<(Self, NotificationDispatcher)> {
        let profile = config.profile;
        info!(mtu = link.mtu(), service = %profile.service, "opening session");

        let write = lookup(&link, profile.service, profile.write)?;
        if !write.properties.write_without_response {
            return Err(DriverError::TransportUnavailable(format!(
                "characteristic {} does not accept write without response",
                profile.write
            )));
        }

        let notify = lookup(&link, profile.service, profile.notify)?;
        if !notify.properties.notify {
            return Err(DriverError::TransportUnavailable(format!(
                "characteristic {} cannot notify",
                profile.notify
            )));
        }

        if config.explicit_cccd {
            debug!(characteristic = %profile.notify, "writing CCC descriptor");
            if !link.write_descriptor(
                notify.handle,
                GattUuid::Short(CCCD_UUID),
                &CCCD_ENABLE_NOTIFICATIONS,
            ) {
                return Err(DriverError::TransportUnavailable(
                    "CCC descriptor write failed".into(),
                ));
            }
        }

        let (dispatcher, sink) = NotificationDispatcher::channel(notify.handle);
        if !link.subscribe(notify.handle, sink) {
            return Err(DriverError::TransportUnavailable(format!(
                "subscribe to {} failed",
                profile.notify
            )));
        }
        info!(
            write = %profile.write,
            notify = %profile.notify,
            "session ready"
        );

        let session = Self {
            link,
            address: None,
            config,
            write: write.handle,
            notify: notify.handle,
            phase: SessionPhase::Ready,
        };
        Ok((session, dispatcher))
    }

    /// Negotiated MTU as currently reported by the link.
    pub fn mtu(&self) -> u16 {
        self.link.mtu()
    }

    /// Write `bytes` without response on the write characteristic.
    pub fn write(&self, bytes: &[u8]) -> DriverResult<()> {
        if self.phase == SessionPhase::Closed {
            return Err(DriverError::TransportUnavailable("session closed".into()));
        }
        if !self.link.write_without_response(self.write, bytes) {
            warn!(len = bytes.len(), "write without response refused");
            return Err(DriverError::WriteRejected { len: bytes.len() });
        }
        Ok(())
    }

    /// Disconnect the link.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.link.disconnect();
        self.phase = SessionPhase::Closed;
        info!(address = ?self.address, "session closed");
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Address the session was connected to, when opened via [`connect`](Self::connect).
    pub fn address(&self) -> Option<DeviceAddress> {
        self.address
    }

    /// Setup options.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Handle of the write characteristic.
    pub fn write_handle(&self) -> CharacteristicHandle {
        self.write
    }

    /// Handle of the notify characteristic.
    pub fn notify_handle(&self) -> CharacteristicHandle {
        self.notify
    }

    /// The underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }
}

fn lookup<L: BleLink>(
    link: &L,
    service: GattUuid,
    characteristic: GattUuid,
) -> DriverResult<RemoteCharacteristic> {
    link.characteristic(service, characteristic).ok_or_else(|| {
        warn!(%service, %characteristic, "characteristic not found");
        DriverError::TransportUnavailable(format!(
            "characteristic {characteristic} not found in service {service}"
        ))
    })
}
