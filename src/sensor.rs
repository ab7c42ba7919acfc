//! Sensor source abstraction.
//!
//! The publisher samples through [`SensorSource`] so the hardware driver
//! stays outside the crate.

use std::f64::consts::TAU;

use crate::error::SensorError;

/// Produces one temperature sample in degrees Celsius per call.
#[cfg_attr(test, mockall::automock)]
pub trait SensorSource {
    /// Take a sample.
    fn read(&mut self) -> Result<f64, SensorError>;
}

impl<F> SensorSource for F
where
    F: FnMut() -> Result<f64, SensorError>,
{
    fn read(&mut self) -> Result<f64, SensorError> {
        self()
    }
}

/// A sensor that follows a slow sine wave around a base temperature.
///
/// Handy for running the publisher on a host without hardware.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    base: f64,
    amplitude: f64,
    period: u32,
    fail_every: Option<u32>,
    reads: u32,
}

impl SimulatedSensor {
    /// Create a sensor that always reports `base` °C.
    pub fn new(base: f64) -> Self {
        Self {
            base,
            amplitude: 0.0,
            period: 1,
            fail_every: None,
            reads: 0,
        }
    }

    /// Oscillate by `amplitude` °C over `period` reads.
    pub fn with_wave(mut self, amplitude: f64, period: u32) -> Self {
        self.amplitude = amplitude;
        self.period = period.max(1);
        self
    }

    /// Fail every `n`th read with [`SensorError::ReadFailed`].
    pub fn with_failures(mut self, n: u32) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Number of reads so far, failed ones included.
    pub fn reads(&self) -> u32 {
        self.reads
    }
}

impl SensorSource for SimulatedSensor {
    fn read(&mut self) -> Result<f64, SensorError> {
        self.reads += 1;

        if let Some(n) = self.fail_every {
            if self.reads % n == 0 {
                return Err(SensorError::ReadFailed {
                    reason: format!("simulated failure on read {}", self.reads),
                });
            }
        }

        let phase = f64::from(self.reads % self.period) / f64::from(self.period);
        Ok(self.base + self.amplitude * (phase * TAU).sin())
    }
}
