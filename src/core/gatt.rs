//! GATT identifiers and device addresses.

use std::fmt;
use std::str::FromStr;

use super::constants::{DEFAULT_NOTIFY_UUID, DEFAULT_SERVICE_UUID, DEFAULT_WRITE_UUID};
use super::error::AddressParseError;

/// Attribute UUID, either a SIG-assigned 16-bit alias or a full 128-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GattUuid {
    /// 16-bit alias of the Bluetooth base UUID.
    Short(u16),
    /// Full 128-bit UUID.
    Long(u128),
}

impl GattUuid {
    /// Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`.
    pub const BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

    /// Expand to the full 128-bit form.
    pub fn to_u128(self) -> u128 {
        match self {
            GattUuid::Short(short) => Self::BASE | ((short as u128) << 96),
            GattUuid::Long(long) => long,
        }
    }
}

impl From<u16> for GattUuid {
    fn from(short: u16) -> Self {
        GattUuid::Short(short)
    }
}

impl From<u128> for GattUuid {
    fn from(long: u128) -> Self {
        GattUuid::Long(long)
    }
}

impl fmt::Display for GattUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GattUuid::Short(short) => write!(f, "{short:04X}"),
            GattUuid::Long(long) => {
                let b = long.to_be_bytes();
                write!(
                    f,
                    "{}-{}-{}-{}-{}",
                    hex::encode(&b[0..4]),
                    hex::encode(&b[4..6]),
                    hex::encode(&b[6..8]),
                    hex::encode(&b[8..10]),
                    hex::encode(&b[10..16])
                )
            }
        }
    }
}

/// Opaque handle of a discovered characteristic, assigned by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle(pub u16);

/// Properties of a discovered characteristic that the driver cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    /// Accepts write without response.
    pub write_without_response: bool,
    /// Can emit notifications.
    pub notify: bool,
}

/// A characteristic found during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteCharacteristic {
    /// Link-assigned handle.
    pub handle: CharacteristicHandle,
    /// Declared properties.
    pub properties: CharacteristicProperties,
}

/// Where the command pipe lives on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattProfile {
    /// Service containing both characteristics.
    pub service: GattUuid,
    /// Characteristic receiving chunks and frames.
    pub write: GattUuid,
    /// Characteristic emitting acknowledgments.
    pub notify: GattUuid,
}

impl Default for GattProfile {
    fn default() -> Self {
        Self {
            service: GattUuid::Short(DEFAULT_SERVICE_UUID),
            write: GattUuid::Short(DEFAULT_WRITE_UUID),
            notify: GattUuid::Short(DEFAULT_NOTIFY_UUID),
        }
    }
}

/// 48-bit Bluetooth device address, most significant octet first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Create from raw octets.
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw octets.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(AddressParseError::OctetCount(parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(AddressParseError::InvalidOctet((*part).to_string()));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidOctet((*part).to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let addr: DeviceAddress = "58:8c:81:72:AB:0A".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0x58, 0x8C, 0x81, 0x72, 0xAB, 0x0A]);
        assert_eq!(addr.to_string(), "58:8C:81:72:AB:0A");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert_eq!(
            "58:8C:81".parse::<DeviceAddress>(),
            Err(AddressParseError::OctetCount(3))
        );
        assert_eq!(
            "58:8C:81:72:AB:ZZ".parse::<DeviceAddress>(),
            Err(AddressParseError::InvalidOctet("ZZ".into()))
        );
        assert_eq!(
            "58:8C:81:72:AB:0".parse::<DeviceAddress>(),
            Err(AddressParseError::InvalidOctet("0".into()))
        );
    }

    #[test]
    fn test_short_uuid_expansion() {
        let uuid = GattUuid::Short(0x2902);
        assert_eq!(uuid.to_u128(), 0x0000_2902_0000_1000_8000_0080_5F9B_34FB);
        assert_eq!(uuid.to_string(), "2902");
        assert_eq!(
            GattUuid::Long(uuid.to_u128()).to_string(),
            "00002902-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_default_profile() {
        let profile = GattProfile::default();
        assert_eq!(profile.service, GattUuid::Short(0xABF0));
        assert_eq!(profile.write, GattUuid::Short(0xABF1));
        assert_eq!(profile.notify, GattUuid::Short(0xABF2));
    }
}
