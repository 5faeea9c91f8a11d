//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each sampling event to the `log`
//! facade, which ends up in the durable log file and on stderr.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { readings } => {
                info!("START | {readings} readings loaded");
            }
            AppEvent::Sampled(r) => match r.value_celsius {
                Some(v) => debug!("SAMPLE | {} | {v:.0}\u{00b0}C", r.timestamp.to_rfc3339()),
                None => debug!("SAMPLE | {} | missing", r.timestamp.to_rfc3339()),
            },
            AppEvent::AlertRaised { value, threshold } => {
                warn!("ALERT | {value:.0}\u{00b0}C crossed {threshold:.0}\u{00b0}C, notification sent");
            }
            AppEvent::Persisted { readings } => {
                debug!("PERSIST | {readings} readings written");
            }
            AppEvent::Trimmed { removed, remaining } => {
                info!("TRIM | removed={removed} remaining={remaining}");
            }
            AppEvent::Stopped { fatal } => {
                if *fatal {
                    warn!("STOP | sampling halted by a fatal sensor error");
                } else {
                    info!("STOP | sampling shut down");
                }
            }
        }
    }
}
