//! Periodic BTHome advertisement publisher.
//!
//! The publisher owns the radio handle and the payload currently on air.
//! It is driven from outside by calling [`AdvertisementPublisher::tick`];
//! each due tick samples the sensor, encodes a fresh payload and swaps it
//! onto the radio by stopping the old advertisement and starting a new one.

use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::ble::radio::RadioSink;
use crate::bthome::{AdvertisementPayload, PayloadBuilder};
use crate::config::PublisherConfig;
use crate::error::{Error, Result};
use crate::sensor::SensorSource;

/// Whether an advertisement has been put on air yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PublisherState {
    /// Nothing has been advertised yet.
    #[default]
    Idle,
    /// The radio holds the current payload.
    Advertising,
}

impl PublisherState {
    /// Check if advertising.
    pub fn is_advertising(&self) -> bool {
        matches!(self, Self::Advertising)
    }
}

impl std::fmt::Display for PublisherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Advertising => write!(f, "Advertising"),
        }
    }
}

/// What a call to [`AdvertisementPublisher::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickOutcome {
    /// The interval has not elapsed; nothing was touched.
    NotDue,
    /// The first advertisement was started.
    Started,
    /// The advertisement was stopped and restarted with a new payload.
    Refreshed,
}

/// Samples, encodes and advertises on a fixed cadence.
///
/// Generic over the sensor and radio so the platform picks its
/// implementations when composing the publisher.
pub struct AdvertisementPublisher<S, R> {
    config: PublisherConfig,
    sensor: S,
    radio: R,
    state: PublisherState,
    current_payload: Option<AdvertisementPayload>,
    last_publish_time: Option<Instant>,
}

impl<S, R> AdvertisementPublisher<S, R>
where
    S: SensorSource,
    R: RadioSink,
{
    /// Create an idle publisher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the configuration is invalid.
    pub fn new(config: PublisherConfig, sensor: S, radio: R) -> Result<Self> {
        config.validate()?;

        info!(
            "Publisher configured: {} | advertising every {} ms, sampling every {} ms",
            config.device_name, config.advertising_interval_ms, config.sampling_interval_ms
        );

        Ok(Self {
            config,
            sensor,
            radio,
            state: PublisherState::Idle,
            current_payload: None,
            last_publish_time: None,
        })
    }

    /// Run one publish cycle if it is due at `now`.
    ///
    /// A cycle reads the sensor once, encodes the reading and then calls
    /// `start_advertising` (first cycle) or `stop_advertising` followed by
    /// `start_advertising` (every later cycle).
    ///
    /// # Errors
    ///
    /// - [`Error::Sensor`] or [`Error::Encoding`]: the cycle is skipped, the
    ///   radio is untouched and `last_publish_time` stays where it was, so
    ///   the next tick retries.
    /// - [`Error::Radio`]: the previous payload stays current, the state is
    ///   unchanged and `last_publish_time` advances to `now`.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        if !self.is_due(now) {
            trace!("Tick not due");
            return Ok(TickOutcome::NotDue);
        }

        let celsius = self.sensor.read().map_err(|e| {
            warn!("Sensor read failed, skipping cycle: {}", e);
            Error::from(e)
        })?;

        let payload = self.encode(celsius).map_err(|e| {
            warn!("Could not encode {} °C, skipping cycle: {}", celsius, e);
            e
        })?;

        self.last_publish_time = Some(now);

        let outcome = match self.state {
            PublisherState::Idle => {
                self.start(&payload)?;
                self.state = PublisherState::Advertising;
                TickOutcome::Started
            }
            PublisherState::Advertising => {
                self.radio.stop_advertising().map_err(|e| {
                    warn!("Radio refused to stop advertising: {}", e);
                    Error::from(e)
                })?;
                self.start(&payload)?;
                TickOutcome::Refreshed
            }
        };

        debug!(
            "BLE advertisement updated - temperature: {:.2}°C | BTHome payload: {}",
            celsius, payload
        );
        self.current_payload = Some(payload);

        Ok(outcome)
    }

    /// Check if a cycle would run at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_publish_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.publish_interval(),
        }
    }

    /// Instant at which the next cycle becomes due, `None` if it is already
    /// due at `now`.
    pub fn next_due(&self, now: Instant) -> Option<Instant> {
        if self.is_due(now) {
            return None;
        }
        self.last_publish_time
            .map(|last| last + self.publish_interval())
    }

    fn encode(&self, celsius: f64) -> Result<AdvertisementPayload> {
        Ok(
            PayloadBuilder::with_header(self.config.company_id, self.config.device_info)
                .temperature(celsius)?
                .build(),
        )
    }

    fn start(&mut self, payload: &AdvertisementPayload) -> Result<()> {
        self.radio
            .start_advertising(
                payload,
                &self.config.device_name,
                self.config.advertising_interval(),
            )
            .map_err(|e| {
                warn!("Radio refused to start advertising: {}", e);
                Error::from(e)
            })
    }
}

impl<S, R> AdvertisementPublisher<S, R> {
    /// Get the current state.
    pub fn state(&self) -> PublisherState {
        self.state
    }

    /// The payload most recently handed to the radio successfully.
    pub fn current_payload(&self) -> Option<&AdvertisementPayload> {
        self.current_payload.as_ref()
    }

    /// When the last cycle ran, `None` before the first one.
    pub fn last_publish_time(&self) -> Option<Instant> {
        self.last_publish_time
    }

    /// Minimum time between cycles.
    pub fn publish_interval(&self) -> Duration {
        self.config.sampling_interval()
    }

    /// Get the configuration.
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Get the sensor.
    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Get the radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Take the publisher apart, returning the sensor and radio.
    pub fn into_parts(self) -> (S, R) {
        (self.sensor, self.radio)
    }
}

impl<S, R> std::fmt::Debug for AdvertisementPublisher<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertisementPublisher")
            .field("device_name", &self.config.device_name)
            .field("state", &self.state)
            .field("current_payload", &self.current_payload)
            .field("last_publish_time", &self.last_publish_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::radio::{LoggingRadio, MockRadioSink, RadioEvent};
    use crate::bthome::encode;
    use crate::error::{RadioError, SensorError};
    use crate::sensor::{MockSensorSource, SimulatedSensor};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    const INTERVAL: Duration = Duration::from_millis(1000);

    fn config() -> PublisherConfig {
        PublisherConfig::new("TS")
            .with_advertising_interval_ms(1000)
            .with_sampling_interval_ms(1000)
    }

    fn expect_reading(sensor: &mut MockSensorSource, celsius: f64) {
        sensor
            .expect_read()
            .times(1)
            .returning(move || Ok(celsius));
    }

    fn expect_start(radio: &mut MockRadioSink, celsius: f64) {
        let expected = encode(celsius).unwrap();
        radio
            .expect_start_advertising()
            .withf(move |payload, name, interval| {
                *payload == expected && name == "TS" && *interval == INTERVAL
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
    }

    /// A publisher that has already completed its first cycle at the returned instant.
    fn started(
        mut sensor: MockSensorSource,
        mut radio: MockRadioSink,
    ) -> (AdvertisementPublisher<MockSensorSource, MockRadioSink>, Instant) {
        expect_reading(&mut sensor, 20.0);
        expect_start(&mut radio, 20.0);

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        let t0 = Instant::now();
        assert_eq!(publisher.tick(t0).unwrap(), TickOutcome::Started);
        (publisher, t0)
    }

    #[test]
    fn test_first_tick_starts_without_stop() {
        let (publisher, t0) = started(MockSensorSource::new(), MockRadioSink::new());

        assert_eq!(publisher.state(), PublisherState::Advertising);
        assert_eq!(publisher.last_publish_time(), Some(t0));
        assert_eq!(publisher.current_payload(), Some(&encode(20.0).unwrap()));
        assert_eq!(publisher.next_due(t0), Some(t0 + INTERVAL));
        assert_eq!(publisher.next_due(t0 + INTERVAL), None);
        assert_eq!(publisher.next_due(t0 + INTERVAL * 3), None);
    }

    #[test]
    fn test_tick_before_interval_is_noop() {
        let (mut publisher, t0) = started(MockSensorSource::new(), MockRadioSink::new());

        // Any further sensor or radio call would panic on the mocks.
        let outcome = publisher.tick(t0 + Duration::from_millis(999)).unwrap();
        assert_eq!(outcome, TickOutcome::NotDue);
        assert_eq!(publisher.last_publish_time(), Some(t0));
        assert!(!publisher.is_due(t0));
        assert!(publisher.is_due(t0 + INTERVAL));
    }

    #[test]
    fn test_refresh_stops_then_starts() {
        let mut sensor = MockSensorSource::new();
        let mut radio = MockRadioSink::new();
        let mut seq = Sequence::new();

        sensor
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(20.0));
        radio
            .expect_start_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        sensor
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(25.06));
        radio
            .expect_stop_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        radio
            .expect_start_advertising()
            .withf(|payload, _, _| payload.as_bytes() == [0xD2, 0xFC, 0x40, 0x02, 0xCA, 0x09])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        let t0 = Instant::now();
        assert_eq!(publisher.tick(t0).unwrap(), TickOutcome::Started);

        let t1 = t0 + INTERVAL;
        assert_eq!(publisher.tick(t1).unwrap(), TickOutcome::Refreshed);
        assert_eq!(publisher.last_publish_time(), Some(t1));
        assert_eq!(publisher.current_payload(), Some(&encode(25.06).unwrap()));
    }

    #[test]
    fn test_sensor_failure_does_not_advance_and_retries() {
        let mut sensor = MockSensorSource::new();
        let mut radio = MockRadioSink::new();
        let mut seq = Sequence::new();

        sensor
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(20.0));
        sensor
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(SensorError::Unavailable));
        sensor
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(21.0));
        radio
            .expect_start_advertising()
            .times(2)
            .returning(|_, _, _| Ok(()));
        radio
            .expect_stop_advertising()
            .times(1)
            .returning(|| Ok(()));

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        let t0 = Instant::now();
        publisher.tick(t0).unwrap();

        let t1 = t0 + INTERVAL;
        let err = publisher.tick(t1).unwrap_err();
        assert!(matches!(err, Error::Sensor(SensorError::Unavailable)));
        assert_eq!(publisher.last_publish_time(), Some(t0));
        assert_eq!(publisher.current_payload(), Some(&encode(20.0).unwrap()));

        // The very next tick is still due and retries.
        let t2 = t1 + Duration::from_millis(50);
        assert_eq!(publisher.tick(t2).unwrap(), TickOutcome::Refreshed);
        assert_eq!(publisher.last_publish_time(), Some(t2));
    }

    #[test]
    fn test_sensor_failure_on_first_tick_stays_idle() {
        let mut sensor = MockSensorSource::new();
        sensor.expect_read().times(1).returning(|| {
            Err(SensorError::ReadFailed {
                reason: "i2c nack".to_string(),
            })
        });

        let mut publisher =
            AdvertisementPublisher::new(config(), sensor, MockRadioSink::new()).unwrap();
        assert!(publisher.tick(Instant::now()).is_err());
        assert_eq!(publisher.state(), PublisherState::Idle);
        assert_eq!(publisher.last_publish_time(), None);
        assert_eq!(publisher.current_payload(), None);
    }

    #[test]
    fn test_non_finite_reading_aborts_before_radio() {
        let (mut publisher, t0) = {
            let mut sensor = MockSensorSource::new();
            let mut seq = Sequence::new();
            sensor
                .expect_read()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|| Ok(20.0));
            sensor
                .expect_read()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|| Ok(f64::NAN));

            let mut radio = MockRadioSink::new();
            expect_start(&mut radio, 20.0);

            let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
            let t0 = Instant::now();
            publisher.tick(t0).unwrap();
            (publisher, t0)
        };

        let err = publisher.tick(t0 + INTERVAL).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
        assert_eq!(publisher.last_publish_time(), Some(t0));
        assert_eq!(publisher.state(), PublisherState::Advertising);
        assert_eq!(publisher.current_payload(), Some(&encode(20.0).unwrap()));
    }

    #[test]
    fn test_start_failure_keeps_previous_payload() {
        let mut sensor = MockSensorSource::new();
        let mut radio = MockRadioSink::new();
        let mut seq = Sequence::new();

        sensor.expect_read().times(2).returning(|| Ok(20.0));
        radio
            .expect_start_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        radio
            .expect_stop_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        radio
            .expect_start_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(RadioError::start_rejected("controller busy")));

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        let t0 = Instant::now();
        publisher.tick(t0).unwrap();

        let t1 = t0 + INTERVAL;
        let err = publisher.tick(t1).unwrap_err();
        assert!(matches!(err, Error::Radio(RadioError::Rejected { .. })));
        assert_eq!(publisher.state(), PublisherState::Advertising);
        assert_eq!(publisher.current_payload(), Some(&encode(20.0).unwrap()));
        assert_eq!(publisher.last_publish_time(), Some(t1));
    }

    #[test]
    fn test_stop_failure_skips_start() {
        let mut sensor = MockSensorSource::new();
        let mut radio = MockRadioSink::new();

        sensor.expect_read().times(2).returning(|| Ok(20.0));
        radio
            .expect_start_advertising()
            .times(1)
            .returning(|_, _, _| Ok(()));
        radio
            .expect_stop_advertising()
            .times(1)
            .returning(|| Err(RadioError::stop_rejected("timeout")));

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        let t0 = Instant::now();
        publisher.tick(t0).unwrap();

        let t1 = t0 + INTERVAL;
        let err = publisher.tick(t1).unwrap_err();
        assert!(matches!(
            err,
            Error::Radio(RadioError::Rejected {
                operation: "stop",
                ..
            })
        ));
        assert_eq!(publisher.state(), PublisherState::Advertising);
        assert_eq!(publisher.last_publish_time(), Some(t1));
        assert_eq!(publisher.current_payload(), Some(&encode(20.0).unwrap()));

        // The failed cycle still counts, so the retry waits a full interval.
        assert_eq!(
            publisher.tick(t1 + Duration::from_millis(500)).unwrap(),
            TickOutcome::NotDue
        );
        assert_eq!(publisher.next_due(t1), Some(t1 + INTERVAL));
    }

    #[test]
    fn test_first_start_failure_stays_idle_and_retries_without_stop() {
        let mut sensor = MockSensorSource::new();
        let mut radio = MockRadioSink::new();
        let mut seq = Sequence::new();

        sensor.expect_read().times(2).returning(|| Ok(20.0));
        radio
            .expect_start_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(RadioError::NotInitialized));
        radio
            .expect_start_advertising()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        let t0 = Instant::now();
        assert!(publisher.tick(t0).is_err());
        assert_eq!(publisher.state(), PublisherState::Idle);
        assert_eq!(publisher.current_payload(), None);

        // Rate limited by the interval like any other cycle.
        assert_eq!(
            publisher.tick(t0 + Duration::from_millis(10)).unwrap(),
            TickOutcome::NotDue
        );
        assert_eq!(
            publisher.tick(t0 + INTERVAL).unwrap(),
            TickOutcome::Started
        );
        assert_eq!(publisher.state(), PublisherState::Advertising);
    }

    #[test]
    fn test_out_of_range_reading_is_clamped() {
        let mut sensor = MockSensorSource::new();
        expect_reading(&mut sensor, 500.0);

        let mut radio = MockRadioSink::new();
        radio
            .expect_start_advertising()
            .withf(|payload, _, _| payload.as_bytes()[4..] == i16::MAX.to_le_bytes())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut publisher = AdvertisementPublisher::new(config(), sensor, radio).unwrap();
        publisher.tick(Instant::now()).unwrap();
    }

    #[test]
    fn test_custom_header_from_config() {
        let mut sensor = MockSensorSource::new();
        expect_reading(&mut sensor, 0.0);

        let mut radio = MockRadioSink::new();
        radio
            .expect_start_advertising()
            .withf(|payload, _, _| payload.as_bytes() == [0xFF, 0xFF, 0x40, 0x02, 0x00, 0x00])
            .times(1)
            .returning(|_, _, _| Ok(()));

        let config = config().with_company_id(0xFFFF);
        let mut publisher = AdvertisementPublisher::new(config, sensor, radio).unwrap();
        publisher.tick(Instant::now()).unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = AdvertisementPublisher::new(
            config().with_sampling_interval_ms(0),
            SimulatedSensor::new(20.0),
            LoggingRadio::new(),
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_cycle_with_logging_radio() {
        let mut publisher =
            AdvertisementPublisher::new(config(), SimulatedSensor::new(21.0), LoggingRadio::new())
                .unwrap();

        let t0 = Instant::now();
        for step in 0..5u32 {
            publisher.tick(t0 + Duration::from_millis(500) * step).unwrap();
        }

        // Cycles ran at 0 ms, 1000 ms and 2000 ms.
        assert_eq!(publisher.sensor().reads(), 3);

        let events = publisher.radio().events();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], RadioEvent::Started { .. }));
        assert_eq!(events[1], RadioEvent::Stopped);
        assert!(matches!(events[2], RadioEvent::Started { .. }));
        assert_eq!(events[3], RadioEvent::Stopped);
        assert!(matches!(events[4], RadioEvent::Started { .. }));

        let (_, radio) = publisher.into_parts();
        assert_eq!(
            radio.current().unwrap().manufacturer_data,
            encode(21.0).unwrap()
        );
    }
}
