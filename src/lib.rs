//! # bthome-advertiser
//!
//! A Rust library for broadcasting sensor readings as
//! [BTHome v2](https://bthome.io) Bluetooth Low Energy advertisements,
//! and for observing them.
//!
//! The crate does not drive a radio itself. A platform supplies a
//! [`SensorSource`] and a [`RadioSink`]; the [`AdvertisementPublisher`]
//! samples, encodes and swaps the advertisement on a fixed cadence.
//!
//! ## Features
//!
//! - **Payload Codec**: Encode and decode BTHome v2 manufacturer data
//! - **Periodic Publisher**: Sample, encode and re-advertise on an interval
//! - **Pluggable Radios**: Any stack that can start and stop an advertisement
//! - **Host Runner**: Drive a publisher from a tokio task
//! - **Scanner**: Discover and decode nearby BTHome devices
//!
//! ## Quick Start
//!
//! ```rust
//! use bthome_advertiser::{
//!     AdvertisementPublisher, LoggingRadio, PublisherConfig, Result, SimulatedSensor,
//!     TickOutcome,
//! };
//! use std::time::Instant;
//!
//! fn main() -> Result<()> {
//!     let config = PublisherConfig::new("MAKE-TS").with_sampling_interval_ms(5000);
//!     let mut publisher =
//!         AdvertisementPublisher::new(config, SimulatedSensor::new(21.5), LoggingRadio::new())?;
//!
//!     assert_eq!(publisher.tick(Instant::now())?, TickOutcome::Started);
//!     println!("On air: {}", publisher.current_payload().unwrap());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for configuration and decoded data

// Public modules
pub mod ble;
pub mod bthome;
pub mod config;
pub mod error;
pub mod publisher;
pub mod runner;
pub mod sensor;

// Re-exports for convenience
pub use ble::radio::{LoggingRadio, RadioEvent, RadioSink};
pub use ble::scanner::{AdvertisedData, BthomeObservation, BthomeScanner};
pub use ble::uuids::{BTHOME_COMPANY_ID, BTHOME_SERVICE_UUID};
pub use bthome::{
    decode, decode_service_data, encode, AdvertisementPayload, BthomePacket, DeviceInfo,
    Measurement, ObjectId, PayloadBuilder,
};
pub use config::PublisherConfig;
pub use error::{Error, RadioError, Result, SensorError};
pub use publisher::{AdvertisementPublisher, PublisherState, TickOutcome};
pub use runner::{PublishEvent, PublisherRunner};
pub use sensor::{SensorSource, SimulatedSensor};
