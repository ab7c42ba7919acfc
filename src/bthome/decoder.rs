//! BTHome v2 payload decoding.
//!
//! Parses the manufacturer data emitted by [`encode`](crate::bthome::encode)
//! and by other BTHome v2 devices.

use crate::ble::uuids::BTHOME_COMPANY_ID;
use crate::bthome::device_info::DeviceInfo;
use crate::bthome::objects::ObjectId;
use crate::error::{Error, Result};

/// A single decoded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// Which quantity this is.
    pub object_id: ObjectId,
    /// The integer carried on the wire, sign-extended.
    pub raw: i64,
}

impl Measurement {
    /// The value in physical units, e.g. `25.06` for a raw temperature of 2506.
    pub fn value(&self) -> f64 {
        self.raw as f64 / f64::from(self.object_id.divisor())
    }

    /// Unit suffix for display.
    pub fn unit(&self) -> &'static str {
        self.object_id.unit()
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.object_id.divisor() == 1 {
            write!(f, "{}: {}", self.object_id, self.raw)?;
        } else {
            write!(f, "{}: {:.2}", self.object_id, self.value())?;
        }
        if !self.unit().is_empty() {
            write!(f, " {}", self.unit())?;
        }
        Ok(())
    }
}

/// A decoded BTHome packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BthomePacket {
    /// The device information byte.
    pub device_info: DeviceInfo,
    /// Objects in the order they appeared.
    pub measurements: Vec<Measurement>,
    /// First object id with an unknown layout, at which parsing stopped.
    pub unknown_object: Option<u8>,
}

impl BthomePacket {
    /// First temperature object in °C.
    pub fn temperature(&self) -> Option<f64> {
        self.find(ObjectId::Temperature).map(|m| m.value())
    }

    /// First temperature object in raw hundredths of a degree.
    pub fn temperature_centi(&self) -> Option<i16> {
        self.find(ObjectId::Temperature).map(|m| m.raw as i16)
    }

    /// First object with the given id.
    pub fn find(&self, object_id: ObjectId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.object_id == object_id)
    }

    /// Whether the payload is encrypted (and therefore not decoded).
    pub fn is_encrypted(&self) -> bool {
        self.device_info.encrypted
    }
}

/// Decode full manufacturer data, company id included.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if the data is too short or carries a
/// company id other than `0xFCD2`.
pub fn decode(manufacturer_data: &[u8]) -> Result<BthomePacket> {
    if manufacturer_data.len() < 3 {
        return Err(Error::InvalidData {
            context: format!(
                "BTHome data too short: {} bytes (need at least 3)",
                manufacturer_data.len()
            ),
        });
    }

    let company_id = u16::from_le_bytes([manufacturer_data[0], manufacturer_data[1]]);
    if company_id != BTHOME_COMPANY_ID {
        return Err(Error::InvalidData {
            context: format!("Unexpected company id: {:#06x}", company_id),
        });
    }

    decode_service_data(&manufacturer_data[2..])
}

/// Decode BTHome data starting at the device information byte.
///
/// This is the form delivered by scanners that key manufacturer data by
/// company id, and the body of BTHome service data.
///
/// Parsing stops at the first unknown object id or truncated value.
/// Encrypted payloads are returned with no measurements.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if `data` is empty.
pub fn decode_service_data(data: &[u8]) -> Result<BthomePacket> {
    let (&info_byte, mut rest) = data.split_first().ok_or_else(|| Error::InvalidData {
        context: "BTHome data is empty".to_string(),
    })?;

    let device_info = DeviceInfo::from_raw(info_byte);
    let mut packet = BthomePacket {
        device_info,
        measurements: Vec::new(),
        unknown_object: None,
    };

    if device_info.encrypted {
        return Ok(packet);
    }

    while let Some((&id_byte, tail)) = rest.split_first() {
        let Some(object_id) = ObjectId::from_raw(id_byte) else {
            packet.unknown_object = Some(id_byte);
            break;
        };

        let size = object_id.size();
        if tail.len() < size {
            break;
        }

        packet.measurements.push(Measurement {
            object_id,
            raw: read_raw(&tail[..size], object_id.is_signed()),
        });
        rest = &tail[size..];
    }

    Ok(packet)
}

fn read_raw(bytes: &[u8], signed: bool) -> i64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    let value = i64::from_le_bytes(buf);

    if signed {
        let shift = 64 - bytes.len() * 8;
        (value << shift) >> shift
    } else {
        value
    }
}
