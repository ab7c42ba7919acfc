//! Publisher configuration.

use std::env;
use std::time::Duration;

use crate::ble::ad_structure::max_name_len;
use crate::ble::uuids::BTHOME_COMPANY_ID;
use crate::bthome::{AdvertisementPayload, DeviceInfo};
use crate::error::{Error, Result};

/// Environment variable overriding [`PublisherConfig::device_name`].
pub const ENV_DEVICE_NAME: &str = "BTHOME_DEVICE_NAME";
/// Environment variable overriding [`PublisherConfig::advertising_interval_ms`].
pub const ENV_ADVERTISING_INTERVAL_MS: &str = "BTHOME_ADVERTISING_INTERVAL_MS";
/// Environment variable overriding [`PublisherConfig::sampling_interval_ms`].
pub const ENV_SAMPLING_INTERVAL_MS: &str = "BTHOME_SAMPLING_INTERVAL_MS";

/// Settings for an [`AdvertisementPublisher`](crate::publisher::AdvertisementPublisher).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublisherConfig {
    /// Complete local name put in every advertisement.
    pub device_name: String,

    /// Milliseconds between advertising packets.
    pub advertising_interval_ms: u32,

    /// Milliseconds between sensor samples (and payload refreshes).
    pub sampling_interval_ms: u32,

    /// Company id written at the start of the manufacturer data.
    pub company_id: u16,

    /// Device information byte following the company id.
    pub device_info: DeviceInfo,
}

impl PublisherConfig {
    /// Shortest advertising interval a legacy advertiser may use.
    pub const MIN_ADVERTISING_INTERVAL_MS: u32 = 20;
    /// Longest advertising interval a legacy advertiser may use.
    pub const MAX_ADVERTISING_INTERVAL_MS: u32 = 10_240;

    /// Default configuration with the given device name.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Self::default()
        }
    }

    /// Load the defaults, then apply any `BTHOME_*` environment overrides.
    ///
    /// A `.env` file in the working directory is loaded first; variables
    /// already set in the environment take precedence over it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if an override does not parse or
    /// the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = env::var(ENV_DEVICE_NAME) {
            config.device_name = name.trim().to_string();
        }
        if let Some(ms) = parse_ms(ENV_ADVERTISING_INTERVAL_MS)? {
            config.advertising_interval_ms = ms;
        }
        if let Some(ms) = parse_ms(ENV_SAMPLING_INTERVAL_MS)? {
            config.sampling_interval_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the device name.
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    /// Set the advertising interval.
    pub fn with_advertising_interval_ms(mut self, ms: u32) -> Self {
        self.advertising_interval_ms = ms;
        self
    }

    /// Set the sampling interval.
    pub fn with_sampling_interval_ms(mut self, ms: u32) -> Self {
        self.sampling_interval_ms = ms;
        self
    }

    /// Set the company id.
    pub fn with_company_id(mut self, company_id: u16) -> Self {
        self.company_id = company_id;
        self
    }

    /// Set the device information byte.
    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = device_info;
        self
    }

    /// Get the advertising interval as a duration.
    pub fn advertising_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.advertising_interval_ms))
    }

    /// Get the sampling interval as a duration.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sampling_interval_ms))
    }

    /// Advertising interval in BLE units of 0.625 ms.
    ///
    /// 1000 ms is 1600 units.
    pub fn advertising_interval_units(&self) -> u64 {
        u64::from(self.advertising_interval_ms) * 8 / 5
    }

    /// Check the configuration for values no radio will accept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let max_name = max_name_len(AdvertisementPayload::TEMPERATURE_SIZE);
        if self.device_name.is_empty() || self.device_name.len() > max_name {
            return Err(invalid("device_name", &self.device_name));
        }

        if !(Self::MIN_ADVERTISING_INTERVAL_MS..=Self::MAX_ADVERTISING_INTERVAL_MS)
            .contains(&self.advertising_interval_ms)
        {
            return Err(invalid(
                "advertising_interval_ms",
                self.advertising_interval_ms,
            ));
        }

        if self.sampling_interval_ms == 0 {
            return Err(invalid("sampling_interval_ms", self.sampling_interval_ms));
        }

        Ok(())
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            device_name: "MAKE-ESP32-S3-TS".to_string(),
            advertising_interval_ms: 5000,
            sampling_interval_ms: 5000,
            company_id: BTHOME_COMPANY_ID,
            device_info: DeviceInfo::v2(),
        }
    }
}

fn parse_ms(key: &str) -> Result<Option<u32>> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &value)),
        Err(_) => Ok(None),
    }
}

fn invalid(name: &str, value: impl ToString) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
