//! BLE module.
//!
//! This module provides the radio-facing side of the crate: advertising
//! data layout, the radio sink abstraction, and a scanner for observing
//! BTHome devices.

pub mod ad_structure;
pub mod radio;
pub mod scanner;
pub mod uuids;

pub use ad_structure::AdvertisementData;
pub use radio::{LoggingRadio, RadioEvent, RadioSink};
pub use scanner::{AdvertisedData, BthomeObservation, BthomeScanner};
pub use uuids::*;
