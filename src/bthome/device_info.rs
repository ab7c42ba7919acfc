//! BTHome device information byte.

/// The device information byte that follows the company id.
///
/// Bit layout:
/// - Bit 0: encryption flag
/// - Bit 2: trigger based device (irregular advertising)
/// - Bits 5-7: BTHome version
///
/// An unencrypted, regularly advertising BTHome v2 device sends `0x40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Payload is encrypted.
    pub encrypted: bool,
    /// Device advertises on events rather than on a fixed interval.
    pub trigger_based: bool,
    /// BTHome format version (3 bits).
    pub version: u8,
}

impl DeviceInfo {
    /// The BTHome version this crate speaks.
    pub const VERSION_2: u8 = 2;

    const ENCRYPTION_BIT: u8 = 0x01;
    const TRIGGER_BIT: u8 = 0x04;
    const VERSION_SHIFT: u8 = 5;

    /// Unencrypted, regularly advertising BTHome v2 device.
    pub const fn v2() -> Self {
        Self {
            encrypted: false,
            trigger_based: false,
            version: Self::VERSION_2,
        }
    }

    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        Self {
            encrypted: value & Self::ENCRYPTION_BIT != 0,
            trigger_based: value & Self::TRIGGER_BIT != 0,
            version: value >> Self::VERSION_SHIFT,
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(&self) -> u8 {
        let mut raw = (self.version & 0x07) << Self::VERSION_SHIFT;
        if self.encrypted {
            raw |= Self::ENCRYPTION_BIT;
        }
        if self.trigger_based {
            raw |= Self::TRIGGER_BIT;
        }
        raw
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::v2()
    }
}
