//! Command server, the reader side of the monitor.
//!
//! Long-polls the [`ChatTransport`] for commands and answers each one from
//! the shared series.  Unauthorized and stale commands are dropped without
//! a reply.  A failing handler is reported through the
//! [`CriticalFailureReporter`](crate::diagnostics::CriticalFailureReporter)
//! and the loop carries on with the next command.

use std::fs;
use std::time::Duration;

use chrono::{Local, TimeDelta};
use log::{debug, info, warn};

use crate::alert::{Cooldown, to_delta};
use crate::diagnostics::file_name;
use crate::error::MonitorError;

use super::commands::{Command, CommandKind};
use super::context::MonitorContext;

/// Reply for `help`, also appended to the unknown-command reply.
pub const HELP_TEXT: &str = "Available commands:\n\
    current-value - latest temperature reading\n\
    chart <hours> - chart of the last <hours> hours\n\
    log - the monitor's log file\n\
    help - this message";

pub const NO_DATA_TEXT: &str = "No data available yet.";
pub const UNKNOWN_TEXT: &str = "Unrecognized command.";

/// Minimum spacing between connectivity warnings in the log.
const CONNECTIVITY_LOG_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct CommandServer {
    ctx: MonitorContext,
    staleness: TimeDelta,
    connectivity_log: Cooldown,
    handled: u64,
}

impl CommandServer {
    pub fn new(ctx: MonitorContext) -> Self {
        let staleness = to_delta(ctx.config.staleness_threshold);
        Self {
            ctx,
            staleness,
            connectivity_log: Cooldown::new(CONNECTIVITY_LOG_INTERVAL),
            handled: 0,
        }
    }

    /// Serve until shutdown.  Shutdown is observed between polls, so this
    /// may take up to one long-poll timeout to return.
    pub fn run(mut self) {
        info!("command server started");
        while !self.ctx.shutdown.is_triggered() {
            self.poll_once();
        }
        info!("command server stopped after {} commands", self.handled);
    }

    /// One long-poll round: fetch a batch and handle every command in it.
    pub fn poll_once(&mut self) {
        match self.ctx.transport.receive_commands() {
            Ok(batch) => {
                for command in &batch {
                    self.handle(command);
                }
            }
            Err(e) if e.is_connectivity() => {
                let now = self.ctx.clock.now();
                if self.connectivity_log.try_fire(now) {
                    warn!("chat service unreachable, retrying: {e}");
                } else {
                    debug!("still unreachable: {e}");
                }
                self.ctx.shutdown.wait(self.ctx.config.reconnect_backoff);
            }
            Err(e) => {
                self.ctx.reporter.report(&format!("Receiving commands failed:\n{e}"));
                self.ctx.shutdown.wait(self.ctx.config.reconnect_backoff);
            }
        }
    }

    /// Authorize, check freshness, then dispatch a single command.
    pub fn handle(&mut self, command: &Command) {
        let now = self.ctx.clock.now();
        if command.sender_channel_id != self.ctx.config.authorized_channel_id {
            debug!("dropping command from unauthorized channel {}", command.sender_channel_id);
            return;
        }
        if command.is_stale(now, self.staleness) {
            debug!("dropping stale command '{}' received at {}", command.text, command.received_at);
            return;
        }

        self.handled += 1;
        let kind = CommandKind::parse(&command.text);
        debug!("handling {kind:?} from {}", command.sender_channel_id);
        if let Err(e) = self.dispatch(kind) {
            self.ctx
                .reporter
                .report(&format!("Handling '{}' failed:\n{e}", command.text));
        }
    }

    pub fn handled(&self) -> u64 {
        self.handled
    }

    // ── Handlers ──────────────────────────────────────────────

    fn dispatch(&self, kind: CommandKind) -> Result<(), MonitorError> {
        match kind {
            CommandKind::CurrentValue => self.reply(&self.current_value_text()),
            CommandKind::Chart { hours: 0 } => {
                debug!("ignoring chart request for 0 hours");
                Ok(())
            }
            CommandKind::Chart { hours } => self.send_chart(hours),
            CommandKind::Log => self.send_log(),
            CommandKind::Help => self.reply(HELP_TEXT),
            CommandKind::Unknown => self.reply(&format!("{UNKNOWN_TEXT}\n\n{HELP_TEXT}")),
        }
    }

    fn reply(&self, text: &str) -> Result<(), MonitorError> {
        self.ctx
            .transport
            .send_text(self.ctx.config.authorized_channel_id, text)?;
        Ok(())
    }

    fn current_value_text(&self) -> String {
        match self.ctx.series.latest() {
            Ok(reading) => match reading.value_celsius {
                Some(value) => format!(
                    "Current temperature: {value:.0}\u{00b0}C (at {})",
                    reading.timestamp.with_timezone(&Local).format("%H:%M:%S")
                ),
                None => NO_DATA_TEXT.to_string(),
            },
            Err(_) => NO_DATA_TEXT.to_string(),
        }
    }

    fn send_chart(&self, requested: u32) -> Result<(), MonitorError> {
        let hours = requested.min(self.ctx.config.retention_hours());
        if hours < requested {
            debug!("chart request for {requested} h clamped to {hours} h");
        }
        let now = self.ctx.clock.now();
        let window = self
            .ctx
            .series
            .window(now, TimeDelta::hours(i64::from(hours)));
        let png = self.ctx.renderer.render(&window, hours)?;
        self.ctx
            .transport
            .send_image(self.ctx.config.authorized_channel_id, &png)?;
        Ok(())
    }

    fn send_log(&self) -> Result<(), MonitorError> {
        let path = &self.ctx.config.log_file;
        let bytes = fs::read(path)?;
        self.ctx.transport.send_document(
            self.ctx.config.authorized_channel_id,
            &file_name(path),
            &bytes,
        )?;
        Ok(())
    }
}
