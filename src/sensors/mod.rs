//! Sensor subsystem: temperature drivers plus the plausibility gate every
//! raw value passes before it is stored.
//!
//! [`TemperatureSource`] is the one concrete [`SensorPort`] the binary
//! builds, selected from [`SensorSource`] in the configuration.

pub mod temperature;

use core::fmt;

use crate::app::ports::SensorPort;
use crate::config::SensorSource;
use crate::error::SensorError;
use temperature::{IioTemperatureSensor, SimulatedTemperatureSensor};

/// Why a raw value was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReading {
    NotFinite,
    NotIntegral,
    OutOfRange,
}

impl fmt::Display for InvalidReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFinite => write!(f, "not a finite number"),
            Self::NotIntegral => write!(f, "not a whole degree"),
            Self::OutOfRange => write!(f, "outside the plausible range"),
        }
    }
}

/// Accept `value` only if it is finite, a whole number of degrees and
/// inside `[min, max]`.
pub fn validate_reading(value: f64, min: f64, max: f64) -> Result<f64, InvalidReading> {
    if !value.is_finite() {
        return Err(InvalidReading::NotFinite);
    }
    if value.fract() != 0.0 {
        return Err(InvalidReading::NotIntegral);
    }
    if value < min || value > max {
        return Err(InvalidReading::OutOfRange);
    }
    Ok(value)
}

/// Runtime-selected sensor driver.
pub enum TemperatureSource {
    Iio(IioTemperatureSensor),
    Simulated(SimulatedTemperatureSensor),
}

impl TemperatureSource {
    pub fn open(source: &SensorSource) -> Result<Self, SensorError> {
        Ok(match source {
            SensorSource::Iio(path) => Self::Iio(IioTemperatureSensor::open(path.clone())?),
            SensorSource::Simulated => {
                log::warn!("using simulated temperature sensor");
                Self::Simulated(SimulatedTemperatureSensor::default())
            }
        })
    }
}

impl SensorPort for TemperatureSource {
    fn read(&mut self) -> Result<f64, SensorError> {
        match self {
            Self::Iio(s) => s.read(),
            Self::Simulated(s) => s.read(),
        }
    }

    fn release(&mut self) {
        match self {
            Self::Iio(s) => s.release(),
            Self::Simulated(s) => s.release(),
        }
    }
}
