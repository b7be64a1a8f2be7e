//! Acknowledgment payload contract.
//!
//! Peers answer every chunk and every frame with a notification. What the
//! payload means is device specific, so the driver delegates the decision to
//! an [`AckValidator`].

use std::fmt::Debug;

/// Verdict on one notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// The peer accepted the preceding write.
    Success,
    /// The peer reported a failure, with its status code when one was present.
    Failure(Option<u8>),
}

impl AckStatus {
    /// Check if this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, AckStatus::Success)
    }
}

/// Decides whether a notification payload acknowledges success.
///
/// # Example
///
/// ```
/// use gatt_replay::core::{AckStatus, AckValidator, StatusByte};
///
/// let validator = StatusByte::new(1, 0x00);
/// assert_eq!(validator.check(&[0x66, 0x00]), AckStatus::Success);
/// assert_eq!(validator.check(&[0x66, 0x07]), AckStatus::Failure(Some(0x07)));
/// ```
pub trait AckValidator: Debug + Send + Sync + 'static {
    /// Classify a payload.
    fn check(&self, payload: &[u8]) -> AckStatus;
}

/// Treats every notification as success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptAny;

impl AckValidator for AcceptAny {
    fn check(&self, _payload: &[u8]) -> AckStatus {
        AckStatus::Success
    }
}

/// Expects a fixed status byte at a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte {
    index: usize,
    success: u8,
}

impl StatusByte {
    /// Byte `index` of the payload must equal `success`.
    pub fn new(index: usize, success: u8) -> Self {
        Self { index, success }
    }
}

impl AckValidator for StatusByte {
    fn check(&self, payload: &[u8]) -> AckStatus {
        match payload.get(self.index) {
            Some(&code) if code == self.success => AckStatus::Success,
            Some(&code) => AckStatus::Failure(Some(code)),
            None => AckStatus::Failure(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_any() {
        assert!(AcceptAny.check(&[]).is_success());
        assert!(AcceptAny.check(&[0xFF, 0xFF]).is_success());
    }

    #[test]
    fn test_status_byte() {
        let validator = StatusByte::new(2, 0x01);
        assert_eq!(validator.check(&[0, 0, 0x01]), AckStatus::Success);
        assert_eq!(validator.check(&[0, 0, 0x03, 9]), AckStatus::Failure(Some(0x03)));
        assert_eq!(validator.check(&[0, 0]), AckStatus::Failure(None));
    }
}
