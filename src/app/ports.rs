//! Port traits: the hexagonal boundary between the monitor core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SamplingLoop / CommandServer (domain)
//! ```
//!
//! Driven adapters (sensor, chat transport, chart renderer, clock, event
//! sinks) implement these traits.  The loops consume them via generics or
//! shared `Arc<dyn _>` handles, so the core never touches hardware or the
//! network directly and every rule is testable with mocks.

use chrono::{DateTime, Utc};

use crate::error::{RenderError, SensorError, TransportError};
use crate::store::TimeSeries;

use super::commands::Command;
use super::events::AppEvent;

/// Chat channel identity (a Telegram chat id, for the shipped adapter).
pub type ChannelId = i64;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the sampling loop calls this to obtain a temperature.
///
/// Owned exclusively by the sampling loop.
pub trait SensorPort {
    /// Read the current temperature in degrees Celsius.
    fn read(&mut self) -> Result<f64, SensorError>;

    /// Release the device.  Reads after release fail with
    /// [`SensorError::Fatal`].
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Chat transport port (driven adapter: domain ↔ remote users)
// ───────────────────────────────────────────────────────────────

/// Conversational transport shared by both loops and the failure reporter.
pub trait ChatTransport: Send + Sync {
    fn send_text(&self, channel: ChannelId, text: &str) -> Result<(), TransportError>;

    /// Send a PNG image.
    fn send_image(&self, channel: ChannelId, png: &[u8]) -> Result<(), TransportError>;

    /// Send a file as a document attachment.
    fn send_document(
        &self,
        channel: ChannelId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError>;

    /// Block until inbound commands arrive or the long-poll times out
    /// (an empty batch).
    fn receive_commands(&self) -> Result<Vec<Command>, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Renderer port (pure)
// ───────────────────────────────────────────────────────────────

/// Turns a series window into an image.  Must not depend on the clock.
pub trait ChartRenderer: Send + Sync {
    /// Render `window`, which covers the last `hours` hours, as PNG bytes.
    fn render(&self, window: &TimeSeries, hours: u32) -> Result<Vec<u8>, RenderError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for timestamps, cooldowns and staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The sampling loop emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}
