//! BTHome v2 payload encoding.
//!
//! Builds the manufacturer-specific data field carried in each advertisement:
//!
//! ```text
//! [company id LE (2)] [device info (1)] ([object id (1)] [value LE (n)])*
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::ble::uuids::BTHOME_COMPANY_ID;
use crate::bthome::device_info::DeviceInfo;
use crate::bthome::objects::ObjectId;
use crate::error::{Error, Result};

/// One complete manufacturer-data field for a single advertisement cycle.
///
/// The bytes are immutable; a new payload replaces the previous one on
/// every refresh. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdvertisementPayload(Bytes);

impl AdvertisementPayload {
    /// Size of the company id and device info header.
    pub const HEADER_SIZE: usize = 3;

    /// Size of a payload holding a single temperature object.
    pub const TEMPERATURE_SIZE: usize = Self::HEADER_SIZE + 3;

    /// Wrap raw manufacturer data without validation.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The full manufacturer data, company id included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A cheap handle to the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The company id from the first two bytes, if present.
    pub fn company_id(&self) -> Option<u16> {
        if self.0.len() < 2 {
            return None;
        }
        Some(u16::from_le_bytes([self.0[0], self.0[1]]))
    }

    /// Bytes following the company id.
    ///
    /// Radio stacks that take the company id as a separate argument
    /// (and scanners that strip it) work with this slice.
    pub fn service_data(&self) -> Bytes {
        if self.0.len() < 2 {
            return Bytes::new();
        }
        self.0.slice(2..)
    }

    /// Space separated upper-case hex dump, e.g. `D2 FC 40 02 CA 09`.
    pub fn to_hex(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl AsRef<[u8]> for AdvertisementPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for AdvertisementPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental builder for payloads carrying several BTHome objects.
///
/// The header is written once; each call to [`object`](Self::object)
/// appends an `[object id][value]` tuple behind it.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    buf: BytesMut,
}

impl PayloadBuilder {
    /// Start a payload with the BTHome company id and a v2 device info byte.
    pub fn new() -> Self {
        Self::with_header(BTHOME_COMPANY_ID, DeviceInfo::v2())
    }

    /// Start a payload with an explicit company id and device info byte.
    pub fn with_header(company_id: u16, device_info: DeviceInfo) -> Self {
        let mut buf = BytesMut::with_capacity(AdvertisementPayload::TEMPERATURE_SIZE);
        buf.put_u16_le(company_id);
        buf.put_u8(device_info.to_raw());
        Self { buf }
    }

    /// Append an object, scaling `value` by the object's resolution.
    ///
    /// The scaled value is rounded half away from zero and clamped to the
    /// range the object's width can carry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `value` is NaN or infinite.
    pub fn object(mut self, id: ObjectId, value: f64) -> Result<Self> {
        let raw = scale_to_raw(id, value)?;
        self.buf.put_u8(id.to_raw());
        self.buf.put_slice(&raw.to_le_bytes()[..id.size()]);
        Ok(self)
    }

    /// Append a temperature object in degrees Celsius.
    pub fn temperature(self, celsius: f64) -> Result<Self> {
        self.object(ObjectId::Temperature, celsius)
    }

    /// Finish the payload.
    pub fn build(self) -> AdvertisementPayload {
        AdvertisementPayload(self.buf.freeze())
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a Celsius reading as a single-object BTHome v2 payload.
///
/// The result is always [`AdvertisementPayload::TEMPERATURE_SIZE`] bytes.
/// Readings beyond ±327.67 °C are clamped to the int16 boundary.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if `celsius` is NaN or infinite.
///
/// # Example
///
/// ```
/// use bthome_advertiser::encode;
///
/// let payload = encode(25.06).unwrap();
/// assert_eq!(payload.as_bytes(), &[0xD2, 0xFC, 0x40, 0x02, 0xCA, 0x09]);
/// ```
pub fn encode(celsius: f64) -> Result<AdvertisementPayload> {
    Ok(PayloadBuilder::new().temperature(celsius)?.build())
}

fn scale_to_raw(id: ObjectId, value: f64) -> Result<i64> {
    if !value.is_finite() {
        return Err(Error::Encoding {
            reason: format!("{} value is not finite: {}", id, value),
        });
    }

    let scaled = (value * f64::from(id.divisor())).round();
    let (min, max) = (id.raw_min(), id.raw_max());

    if scaled < min as f64 || scaled > max as f64 {
        debug!(
            "{} value {} out of range, clamping to [{}, {}]",
            id, value, min, max
        );
    }

    // Float to int casts saturate, the clamp narrows to the object width.
    Ok((scaled as i64).clamp(min, max))
}
