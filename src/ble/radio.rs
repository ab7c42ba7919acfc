//! Radio sink abstraction.
//!
//! The publisher never talks to a BLE stack directly. Each platform supplies
//! a [`RadioSink`] that knows how to put a payload on air and take it off
//! again; which implementation is used is decided when the publisher is
//! constructed.

use std::time::Duration;
use tracing::{debug, info};

use crate::ble::ad_structure::AdvertisementData;
use crate::bthome::AdvertisementPayload;
use crate::error::RadioError;

/// A radio that can broadcast one advertisement at a time.
///
/// Implementations are not assumed to be reentrant; callers serialize access.
#[cfg_attr(test, mockall::automock)]
pub trait RadioSink {
    /// Start broadcasting `payload` as manufacturer data.
    ///
    /// # Arguments
    ///
    /// * `payload` - Manufacturer data, company id included
    /// * `device_name` - Complete local name to advertise
    /// * `interval` - Advertising interval
    fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
        device_name: &str,
        interval: Duration,
    ) -> Result<(), RadioError>;

    /// Stop the current advertisement.
    fn stop_advertising(&mut self) -> Result<(), RadioError>;
}

impl<R: RadioSink + ?Sized> RadioSink for Box<R> {
    fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
        device_name: &str,
        interval: Duration,
    ) -> Result<(), RadioError> {
        (**self).start_advertising(payload, device_name, interval)
    }

    fn stop_advertising(&mut self) -> Result<(), RadioError> {
        (**self).stop_advertising()
    }
}

/// A transition observed by a [`LoggingRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Advertising started with the given data and interval.
    Started {
        /// What went on air.
        data: AdvertisementData,
        /// Advertising interval.
        interval: Duration,
    },
    /// Advertising stopped.
    Stopped,
}

/// A host-side radio that logs and records advertisements instead of
/// transmitting them.
///
/// Used by the demos and for dry runs; the advertising data is still encoded
/// so oversized names are rejected exactly as a real stack would.
#[derive(Debug, Default)]
pub struct LoggingRadio {
    current: Option<AdvertisementData>,
    events: Vec<RadioEvent>,
}

impl LoggingRadio {
    /// Create an idle radio.
    pub fn new() -> Self {
        Self::default()
    }

    /// The advertisement currently on air.
    pub fn current(&self) -> Option<&AdvertisementData> {
        self.current.as_ref()
    }

    /// Check if advertising.
    pub fn is_advertising(&self) -> bool {
        self.current.is_some()
    }

    /// Every transition seen so far, oldest first.
    pub fn events(&self) -> &[RadioEvent] {
        &self.events
    }
}

impl RadioSink for LoggingRadio {
    fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
        device_name: &str,
        interval: Duration,
    ) -> Result<(), RadioError> {
        if self.current.is_some() {
            return Err(RadioError::start_rejected("already advertising"));
        }

        let data = AdvertisementData::new(device_name, payload.clone());
        let raw = data
            .encode()
            .map_err(|e| RadioError::start_rejected(e.to_string()))?;

        info!(
            "Advertising {} every {} ms | BTHome payload: {}",
            device_name,
            interval.as_millis(),
            payload
        );
        debug!("Raw advertising data: {:02X?}", &raw[..]);

        self.current = Some(data.clone());
        self.events.push(RadioEvent::Started { data, interval });
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), RadioError> {
        if self.current.take().is_some() {
            debug!("Advertising stopped");
        }
        self.events.push(RadioEvent::Stopped);
        Ok(())
    }
}
