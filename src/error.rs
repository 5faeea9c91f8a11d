//! Unified error types for the monitor.
//!
//! Each concern (sensor, store, chat transport, chart rendering) has its
//! own small enum so callers can match on exactly the failures they are
//! expected to recover from.  Everything funnels into [`MonitorError`],
//! which keeps the two loops' error handling uniform.

use core::fmt;
use std::io;

use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Top-level monitor error
// ---------------------------------------------------------------------------

/// Every fallible operation in the monitor funnels into this type.
#[derive(Debug)]
pub enum MonitorError {
    /// The sensor failed in a way sampling cannot recover from.
    Sensor(SensorError),
    /// The persisted series could not be read or written.
    Store(StoreError),
    /// The chat transport rejected or lost a request.
    Transport(TransportError),
    /// A chart could not be produced.
    Render(RenderError),
    /// Configuration is missing or invalid.
    Config(ConfigError),
    /// Any other file-system failure (e.g. reading the log file).
    Io(io::Error),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Render(e) => write!(f, "render: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Io(e) => write!(f, "I/O: {e}"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(StoreError::Io(e)) | Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Outcome of a failed sensor read.
///
/// The split drives the sampling policy: transient glitches are retried
/// in place, fatal faults stop sampling and are escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// Read glitch (checksum mismatch, bus timeout); the next attempt may succeed.
    Transient(String),
    /// The device is gone or in a state sampling cannot recover from.
    Fatal(String),
}

impl SensorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient read error: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal sensor fault: {msg}"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for MonitorError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    /// The series holds no readings.
    Empty,
    /// The persisted file exists but could not be parsed.
    Malformed { line: usize, reason: String },
    /// Reading or writing the persisted file failed.
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no readings stored"),
            Self::Malformed { line, reason } => write!(f, "malformed data file, line {line}: {reason}"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<StoreError> for MonitorError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote endpoint could not be reached (DNS, TCP, TLS, timeout).
    Connectivity(String),
    /// The remote endpoint answered but refused the request.
    Api { code: i64, description: String },
    /// The response could not be decoded.
    Decode(String),
}

impl TransportError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity(msg) => write!(f, "unreachable: {msg}"),
            Self::Api { code, description } => write!(f, "API error {code}: {description}"),
            Self::Decode(msg) => write!(f, "undecodable response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for MonitorError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Render errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The requested image size is unusable.
    InvalidSize { width: u32, height: u32 },
    /// Encoding the raster into an image format failed.
    Encode(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize { width, height } => write!(f, "invalid chart size {width}x{height}"),
            Self::Encode(msg) => write!(f, "encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<RenderError> for MonitorError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

impl From<ConfigError> for MonitorError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<io::Error> for MonitorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Monitor-wide `Result` alias.
pub type Result<T> = core::result::Result<T, MonitorError>;
