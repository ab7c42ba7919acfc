//! BTHome v2 object definitions.
//!
//! Each object in a BTHome payload is a one-byte object id followed by a
//! little-endian integer whose width, signedness and scale are fixed by the id.

/// BTHome object id.
///
/// Values defined in the BTHome v2 format:
/// <https://bthome.io/format/>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ObjectId {
    /// Packet id, used by receivers to drop duplicates.
    PacketId = 0x00,
    /// Battery level in percent.
    Battery = 0x01,
    /// Temperature in °C with 0.01 resolution.
    Temperature = 0x02,
    /// Relative humidity in percent with 0.01 resolution.
    Humidity = 0x03,
    /// Pressure in hPa with 0.01 resolution.
    Pressure = 0x04,
    /// Illuminance in lux with 0.01 resolution.
    Illuminance = 0x05,
    /// Mass in kg with 0.01 resolution.
    MassKg = 0x06,
    /// Mass in lb with 0.01 resolution.
    MassLb = 0x07,
    /// Dew point in °C with 0.01 resolution.
    DewPoint = 0x08,
    /// Generic counter.
    Count = 0x09,
    /// Energy in kWh with 0.001 resolution.
    Energy = 0x0A,
    /// Power in W with 0.01 resolution.
    Power = 0x0B,
    /// Voltage in V with 0.001 resolution.
    Voltage = 0x0C,
    /// PM2.5 particulate concentration.
    Pm25 = 0x0D,
    /// PM10 particulate concentration.
    Pm10 = 0x0E,
    /// Generic boolean.
    Boolean = 0x0F,
    /// Power on/off state.
    PowerOn = 0x10,
    /// Opening (door/window) state.
    Opening = 0x11,
    /// CO2 concentration in ppm.
    Co2 = 0x12,
    /// Total volatile organic compounds.
    Tvoc = 0x13,
    /// Moisture in percent with 0.01 resolution.
    Moisture = 0x14,
}

impl ObjectId {
    /// Look up an object id from its raw byte.
    ///
    /// Returns `None` for ids this crate does not know the layout of.
    pub fn from_raw(value: u8) -> Option<Self> {
        let id = match value {
            0x00 => Self::PacketId,
            0x01 => Self::Battery,
            0x02 => Self::Temperature,
            0x03 => Self::Humidity,
            0x04 => Self::Pressure,
            0x05 => Self::Illuminance,
            0x06 => Self::MassKg,
            0x07 => Self::MassLb,
            0x08 => Self::DewPoint,
            0x09 => Self::Count,
            0x0A => Self::Energy,
            0x0B => Self::Power,
            0x0C => Self::Voltage,
            0x0D => Self::Pm25,
            0x0E => Self::Pm10,
            0x0F => Self::Boolean,
            0x10 => Self::PowerOn,
            0x11 => Self::Opening,
            0x12 => Self::Co2,
            0x13 => Self::Tvoc,
            0x14 => Self::Moisture,
            _ => return None,
        };
        Some(id)
    }

    /// Convert to raw byte value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }

    /// Width of the value in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::PacketId
            | Self::Battery
            | Self::Count
            | Self::Boolean
            | Self::PowerOn
            | Self::Opening => 1,
            Self::Pressure | Self::Illuminance | Self::Energy | Self::Power => 3,
            _ => 2,
        }
    }

    /// Whether the value is a two's-complement signed integer.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::Temperature | Self::MassKg | Self::MassLb | Self::DewPoint
        )
    }

    /// Number of raw units per physical unit.
    ///
    /// A temperature of 25.06 °C is transmitted as `2506` because the
    /// divisor for [`ObjectId::Temperature`] is 100.
    pub fn divisor(&self) -> u32 {
        match self {
            Self::Temperature
            | Self::Humidity
            | Self::Pressure
            | Self::Illuminance
            | Self::MassKg
            | Self::MassLb
            | Self::DewPoint
            | Self::Power
            | Self::Moisture => 100,
            Self::Energy | Self::Voltage => 1000,
            _ => 1,
        }
    }

    /// Smallest raw value representable on the wire.
    pub fn raw_min(&self) -> i64 {
        if self.is_signed() {
            -(1i64 << (self.size() * 8 - 1))
        } else {
            0
        }
    }

    /// Largest raw value representable on the wire.
    pub fn raw_max(&self) -> i64 {
        if self.is_signed() {
            (1i64 << (self.size() * 8 - 1)) - 1
        } else {
            (1i64 << (self.size() * 8)) - 1
        }
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PacketId => "Packet ID",
            Self::Battery => "Battery",
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Pressure => "Pressure",
            Self::Illuminance => "Illuminance",
            Self::MassKg => "Mass",
            Self::MassLb => "Mass (lb)",
            Self::DewPoint => "Dew point",
            Self::Count => "Count",
            Self::Energy => "Energy",
            Self::Power => "Power",
            Self::Voltage => "Voltage",
            Self::Pm25 => "PM2.5",
            Self::Pm10 => "PM10",
            Self::Boolean => "Boolean",
            Self::PowerOn => "Power (on)",
            Self::Opening => "Opening",
            Self::Co2 => "CO2",
            Self::Tvoc => "TVOC",
            Self::Moisture => "Moisture",
        }
    }

    /// Unit suffix, empty for dimensionless objects.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Battery | Self::Humidity | Self::Moisture => "%",
            Self::Temperature | Self::DewPoint => "°C",
            Self::Pressure => "hPa",
            Self::Illuminance => "lux",
            Self::MassKg => "kg",
            Self::MassLb => "lb",
            Self::Energy => "kWh",
            Self::Power => "W",
            Self::Voltage => "V",
            Self::Pm25 | Self::Pm10 | Self::Tvoc => "µg/m³",
            Self::Co2 => "ppm",
            _ => "",
        }
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_roundtrip_raw() {
        for raw in 0x00..=0x14u8 {
            let id = ObjectId::from_raw(raw).unwrap();
            assert_eq!(id.to_raw(), raw);
        }
        assert_eq!(ObjectId::from_raw(0x15), None);
        assert_eq!(ObjectId::from_raw(0xFF), None);
    }

    #[test]
    fn test_temperature_layout() {
        let id = ObjectId::Temperature;
        assert_eq!(id.size(), 2);
        assert!(id.is_signed());
        assert_eq!(id.divisor(), 100);
        assert_eq!(id.raw_min(), i16::MIN as i64);
        assert_eq!(id.raw_max(), i16::MAX as i64);
        assert_eq!(id.unit(), "°C");
    }

    #[test]
    fn test_unsigned_ranges() {
        assert_eq!(ObjectId::Battery.raw_min(), 0);
        assert_eq!(ObjectId::Battery.raw_max(), 255);
        assert_eq!(ObjectId::Pressure.raw_max(), 0xFF_FFFF);
        assert_eq!(ObjectId::Voltage.divisor(), 1000);
    }
}
