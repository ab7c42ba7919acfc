//! Error types for the bthome-advertiser crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// A value could not be encoded into a BTHome payload.
    #[error("Encoding failed: {reason}")]
    Encoding {
        /// Why the value was rejected.
        reason: String,
    },

    /// The sensor collaborator failed to produce a reading.
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// The radio collaborator rejected an advertising request.
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// Invalid data was received.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// The advertising data does not fit in a legacy advertisement.
    #[error("Advertising data too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Failure reported by a [`SensorSource`](crate::sensor::SensorSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor has not been initialized or is powered down.
    #[error("sensor unavailable")]
    Unavailable,

    /// The sensor was reachable but the read failed.
    #[error("read failed: {reason}")]
    ReadFailed {
        /// Driver-supplied description.
        reason: String,
    },
}

/// Failure reported by a [`RadioSink`](crate::ble::radio::RadioSink).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The radio stack has not been brought up.
    #[error("radio not initialized")]
    NotInitialized,

    /// The radio stack refused the request.
    #[error("{operation} rejected: {reason}")]
    Rejected {
        /// The operation that was attempted (`start` or `stop`).
        operation: &'static str,
        /// Stack-supplied description.
        reason: String,
    },
}

impl RadioError {
    /// Shorthand for a rejected `start_advertising` call.
    pub fn start_rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation: "start",
            reason: reason.into(),
        }
    }

    /// Shorthand for a rejected `stop_advertising` call.
    pub fn stop_rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation: "stop",
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
