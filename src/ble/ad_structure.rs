//! Legacy advertising data (AD) structure encoding.
//!
//! A legacy advertisement carries at most 31 bytes of `[len][type][data]`
//! structures. The beacon advertises flags, its complete local name and the
//! BTHome manufacturer data.

use bytes::{BufMut, Bytes, BytesMut};

use crate::bthome::AdvertisementPayload;
use crate::error::{Error, Result};

/// Maximum size of legacy advertising data.
pub const MAX_LEGACY_AD_SIZE: usize = 31;

/// AD type: flags.
pub const AD_TYPE_FLAGS: u8 = 0x01;
/// AD type: complete local name.
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
/// AD type: manufacturer specific data.
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// LE General Discoverable Mode.
pub const FLAG_LE_GENERAL_DISCOVERABLE: u8 = 0x02;
/// BR/EDR not supported.
pub const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// The advertising data for one beacon broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementData {
    /// Flags byte.
    pub flags: u8,
    /// Complete local name.
    pub local_name: String,
    /// Manufacturer data, company id included.
    pub manufacturer_data: AdvertisementPayload,
}

impl AdvertisementData {
    /// Create advertising data with flags `0x06` (LE only, general discoverable).
    pub fn new(local_name: impl Into<String>, manufacturer_data: AdvertisementPayload) -> Self {
        Self {
            flags: FLAG_LE_GENERAL_DISCOVERABLE | FLAG_BR_EDR_NOT_SUPPORTED,
            local_name: local_name.into(),
            manufacturer_data,
        }
    }

    /// Number of bytes [`encode`](Self::encode) will produce.
    pub fn encoded_len(&self) -> usize {
        3 + (2 + self.local_name.len()) + (2 + self.manufacturer_data.len())
    }

    /// Encode into raw AD structures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the result exceeds
    /// [`MAX_LEGACY_AD_SIZE`].
    pub fn encode(&self) -> Result<Bytes> {
        let size = self.encoded_len();
        if size > MAX_LEGACY_AD_SIZE {
            return Err(Error::PayloadTooLarge {
                size,
                max: MAX_LEGACY_AD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(size);

        buf.put_u8(2);
        buf.put_u8(AD_TYPE_FLAGS);
        buf.put_u8(self.flags);

        buf.put_u8((1 + self.local_name.len()) as u8);
        buf.put_u8(AD_TYPE_COMPLETE_LOCAL_NAME);
        buf.put_slice(self.local_name.as_bytes());

        buf.put_u8((1 + self.manufacturer_data.len()) as u8);
        buf.put_u8(AD_TYPE_MANUFACTURER_DATA);
        buf.put_slice(self.manufacturer_data.as_bytes());

        Ok(buf.freeze())
    }
}

/// Longest device name that still fits next to a payload of `payload_len` bytes.
pub fn max_name_len(payload_len: usize) -> usize {
    MAX_LEGACY_AD_SIZE.saturating_sub(3 + 2 + 2 + payload_len)
}
