//! Outbound application events.
//!
//! The [`SamplingLoop`](super::sampling::SamplingLoop) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log, forward, count).

use crate::store::Reading;

/// Structured events emitted by the sampling loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Sampling started with this many readings already loaded.
    Started { readings: usize },

    /// A validated reading was appended to the series.
    Sampled(Reading),

    /// A threshold notification was delivered.
    AlertRaised { value: f64, threshold: f64 },

    /// The series was written to disk.
    Persisted { readings: usize },

    /// The retention window was enforced.
    Trimmed { removed: usize, remaining: usize },

    /// Sampling stopped (shutdown or fatal sensor fault).
    Stopped { fatal: bool },
}
