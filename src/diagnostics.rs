//! Critical failure reporting and panic logging.
//!
//! [`CriticalFailureReporter`] is the single escalation path used by both
//! loops.  Every report is written to the durable log; at most one per
//! escalation cooldown is additionally forwarded to the operator channel
//! as a one-line summary plus the log file.
//!
//! The cooldown check, the send and the cooldown update run under one
//! mutex, so concurrent failures from both loops cannot produce two
//! escalations inside the same window.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::alert::Cooldown;
use crate::app::ports::{ChannelId, ChatTransport, Clock};

/// Summary used when the detail has no printable line.
const FALLBACK_SUMMARY: &str = "critical failure (no detail)";

/// Rate-limited escalation to the operator channel.
pub struct CriticalFailureReporter {
    transport: Arc<dyn ChatTransport>,
    clock: Arc<dyn Clock>,
    channel: ChannelId,
    log_file: PathBuf,
    cooldown: Mutex<Cooldown>,
}

impl CriticalFailureReporter {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        clock: Arc<dyn Clock>,
        channel: ChannelId,
        log_file: PathBuf,
        cooldown: Duration,
    ) -> Self {
        Self {
            transport,
            clock,
            channel,
            log_file,
            cooldown: Mutex::new(Cooldown::new(cooldown)),
        }
    }

    /// Log `detail` and escalate it if the cooldown allows.
    /// Returns `true` if an escalation was sent.
    pub fn report(&self, detail: &str) -> bool {
        error!("{detail}");

        let mut cooldown = self.cooldown.lock();
        let now = self.clock.now();
        if !cooldown.is_ready(now) {
            debug!("escalation suppressed, last sent at {:?}", cooldown.last());
            return false;
        }

        // Escalation failures are logged only; reporting them would recurse.
        if let Err(e) = self.transport.send_text(self.channel, summary_line(detail)) {
            warn!("escalation to channel {} failed: {e}", self.channel);
            return false;
        }
        match fs::read(&self.log_file) {
            Ok(bytes) => {
                if let Err(e) = self.transport.send_document(self.channel, &file_name(&self.log_file), &bytes) {
                    warn!("sending log file with escalation failed: {e}");
                }
            }
            Err(e) => warn!("cannot attach log file {}: {e}", self.log_file.display()),
        }

        cooldown.restart(now);
        true
    }
}

/// Last non-empty line of an error detail.
pub fn summary_line(detail: &str) -> &str {
    detail
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or(FALLBACK_SUMMARY)
}

/// File name used when attaching `path` as a document.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "log.txt".to_string(), |n| n.to_string_lossy().into_owned())
}

// ───────────────────────────────────────────────────────────────
// Panic hook: records panics in the durable log
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that writes the panic reason and location to the log.
///
/// Must be called once during init, after logging is ready.  The default
/// hook still runs afterwards; the panicking loop's thread then ends and
/// the binary reports it through the [`CriticalFailureReporter`].
pub fn install_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        let thread = std::thread::current();
        let location = info
            .location()
            .map_or_else(|| "unknown location".to_string(), ToString::to_string);

        error!(
            "PANIC in thread '{}' at {location}: {reason}",
            thread.name().unwrap_or("<unnamed>")
        );
        default_hook(info);
    }));
}
