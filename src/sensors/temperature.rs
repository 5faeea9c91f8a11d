//! Temperature sensor drivers.
//!
//! - [`IioTemperatureSensor`] reads a Linux IIO sysfs attribute
//!   (`in_temp_input`, millidegrees Celsius).
//! - [`SimulatedTemperatureSensor`] produces a deterministic wave around
//!   room temperature for runs without hardware.
//!
//! ## Error classification
//!
//! The IIO attribute is re-read on every sample.  Errors the kernel uses
//! for a busy or briefly unresponsive device are transient; a missing
//! attribute or denied access will not fix itself and is fatal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::app::ports::SensorPort;
use crate::error::SensorError;

const MILLIDEGREES_PER_DEGREE: f64 = 1000.0;

// errno values the IIO core returns while a conversion is in flight.
const EIO: i32 = 5;
const EAGAIN: i32 = 11;
const EBUSY: i32 = 16;

/// Sensor backed by an IIO sysfs temperature attribute.
pub struct IioTemperatureSensor {
    path: PathBuf,
    released: bool,
}

impl IioTemperatureSensor {
    /// Open the sensor, failing fast if the attribute cannot be read at all.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SensorError> {
        let path = path.into();
        fs::metadata(&path).map_err(|e| classify_io(&path, &e))?;
        debug!("IIO temperature sensor at {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

}

impl SensorPort for IioTemperatureSensor {
    fn read(&mut self) -> Result<f64, SensorError> {
        if self.released {
            return Err(SensorError::Fatal("sensor already released".into()));
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| classify_io(&self.path, &e))?;
        parse_millidegrees(&raw)
    }

    fn release(&mut self) {
        if !self.released {
            debug!("releasing {}", self.path.display());
            self.released = true;
        }
    }
}

/// Convert the attribute contents to whole degrees Celsius, rounding
/// half away from zero.
pub fn parse_millidegrees(raw: &str) -> Result<f64, SensorError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map(|milli| (milli as f64 / MILLIDEGREES_PER_DEGREE).round())
        .map_err(|_| SensorError::Transient(format!("unreadable sensor value {trimmed:?}")))
}

fn classify_io(path: &Path, err: &io::Error) -> SensorError {
    let msg = format!("{}: {err}", path.display());
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
            SensorError::Transient(msg)
        }
        _ => match err.raw_os_error() {
            Some(EIO | EAGAIN | EBUSY) => SensorError::Transient(msg),
            _ => SensorError::Fatal(msg),
        },
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Offsets from the base temperature, cycled one per read.
const SIM_WAVE: [i8; 12] = [0, 0, 1, 1, 2, 2, 1, 0, -1, -1, -2, -1];

/// Every this many reads the simulated sensor reports a transient fault.
const SIM_FAULT_EVERY: u64 = 17;

/// Deterministic stand-in for a real sensor.
pub struct SimulatedTemperatureSensor {
    base_celsius: i8,
    reads: u64,
    released: bool,
}

impl Default for SimulatedTemperatureSensor {
    fn default() -> Self {
        Self::new(22)
    }
}

impl SimulatedTemperatureSensor {
    pub fn new(base_celsius: i8) -> Self {
        Self {
            base_celsius,
            reads: 0,
            released: false,
        }
    }
}

impl SensorPort for SimulatedTemperatureSensor {
    fn read(&mut self) -> Result<f64, SensorError> {
        if self.released {
            return Err(SensorError::Fatal("simulated sensor released".into()));
        }
        self.reads += 1;
        if self.reads % SIM_FAULT_EVERY == 0 {
            return Err(SensorError::Transient("simulated bus glitch".into()));
        }
        let offset = SIM_WAVE[(self.reads as usize) % SIM_WAVE.len()];
        Ok(f64::from(self.base_celsius) + f64::from(offset))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
