//! Sampling loop, the writer side of the monitor.
//!
//! [`SamplingLoop`] owns the sensor, the alert policy and the maintenance
//! timers.  Each tick runs the same fixed pipeline:
//!
//! ```text
//!  maintenance ─▶ acquisition ─▶ validation ─▶ append ─▶ alert ─▶ sleep
//!  (persist/trim)   (retry on       (finite,      (shared    (threshold +
//!                    transient)      integral,     series)    cooldown)
//!                                    plausible)
//! ```
//!
//! Transient sensor errors and rejected readings are retried in place and
//! never count as a sample.  A fatal sensor error is escalated, the series
//! is persisted one last time, the sensor released, and the loop returns
//! the error.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};

use crate::alert::{AlertPolicy, to_delta};
use crate::error::{MonitorError, SensorError};
use crate::sensors::validate_reading;
use crate::store::Reading;

use super::context::MonitorContext;
use super::events::AppEvent;
use super::ports::{EventSink, SensorPort};

/// Consecutive failed attempts after which a stalled acquisition is reported.
const STALL_REPORT_ATTEMPTS: u32 = 30;

/// The sampling state machine.
pub struct SamplingLoop<S: SensorPort, E: EventSink> {
    ctx: MonitorContext,
    sensor: S,
    sink: E,
    alert: AlertPolicy,
    persist_every: TimeDelta,
    trim_every: TimeDelta,
    retention: TimeDelta,
    last_persist: DateTime<Utc>,
    last_trim: DateTime<Utc>,
    tick_count: u64,
}

impl<S: SensorPort, E: EventSink> SamplingLoop<S, E> {
    /// Build the loop.  Maintenance timers start at construction time, so
    /// the first persist happens one persist interval after startup.
    pub fn new(ctx: MonitorContext, sensor: S, sink: E) -> Self {
        let now = ctx.clock.now();
        let cfg = &ctx.config;
        let alert = AlertPolicy::new(
            cfg.alert_threshold_celsius,
            cfg.alert_direction,
            cfg.notification_cooldown,
        );
        let persist_every = to_delta(cfg.persist_interval);
        let trim_every = to_delta(cfg.trim_interval);
        let retention = to_delta(cfg.retention_window);
        Self {
            ctx,
            sensor,
            sink,
            alert,
            persist_every,
            trim_every,
            retention,
            last_persist: now,
            last_trim: now,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Tick until shutdown or a fatal sensor error.
    pub fn run(mut self) -> Result<(), MonitorError> {
        info!(
            "sampling every {:?}, alerting {} {}\u{00b0}C",
            self.ctx.config.sample_interval,
            self.alert.direction(),
            self.alert.threshold()
        );
        self.sink.emit(&AppEvent::Started {
            readings: self.ctx.series.len(),
        });

        let result = loop {
            if self.ctx.shutdown.is_triggered() {
                break Ok(());
            }
            if let Err(e) = self.tick() {
                break Err(e);
            }
            if self.ctx.shutdown.wait(self.ctx.config.sample_interval) {
                break Ok(());
            }
        };

        if let Err(e) = &result {
            self.ctx
                .reporter
                .report(&format!("Sampling stopped after {} ticks.\n{e}", self.tick_count));
        }
        self.finish(result.is_err());
        result
    }

    /// Persist, release the sensor and announce the stop.
    fn finish(&mut self, fatal: bool) {
        let now = self.ctx.clock.now();
        self.persist(now);
        self.sensor.release();
        self.sink.emit(&AppEvent::Stopped { fatal });
        info!("sampling stopped after {} ticks", self.tick_count);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one tick without the trailing sleep.
    ///
    /// Returns the appended reading, or `None` if shutdown interrupted
    /// acquisition.  Only a fatal sensor error is returned as `Err`.
    pub fn tick(&mut self) -> Result<Option<Reading>, MonitorError> {
        self.tick_count += 1;

        // 1. Maintenance
        self.maintain(self.ctx.clock.now());

        // 2–3. Acquisition + validation
        let Some(value) = self.acquire()? else {
            return Ok(None);
        };

        // 4. Append
        let reading = Reading::new(self.ctx.clock.now(), value);
        if self.ctx.series.append(reading) {
            self.sink.emit(&AppEvent::Sampled(reading));
        }

        // 5. Alert
        self.evaluate_alert(value, reading.timestamp);

        Ok(Some(reading))
    }

    // ── Internal ──────────────────────────────────────────────

    fn maintain(&mut self, now: DateTime<Utc>) {
        if now.signed_duration_since(self.last_trim) >= self.trim_every {
            self.last_trim = now;
            let removed = self.ctx.series.trim(now, self.retention);
            self.sink.emit(&AppEvent::Trimmed {
                removed,
                remaining: self.ctx.series.len(),
            });
            self.persist(now);
        } else if now.signed_duration_since(self.last_persist) >= self.persist_every {
            self.persist(now);
        }
    }

    fn persist(&mut self, now: DateTime<Utc>) {
        self.last_persist = now;
        let path = &self.ctx.config.data_file;
        match self.ctx.series.persist(path) {
            Ok(readings) => self.sink.emit(&AppEvent::Persisted { readings }),
            Err(e) => {
                self.ctx
                    .reporter
                    .report(&format!("Persisting {} failed:\n{e}", path.display()));
            }
        }
    }

    /// Read until a valid value arrives.  `Ok(None)` means shutdown was
    /// requested while backing off.  A long unbroken run of failures is
    /// reported once and then only logged.
    fn acquire(&mut self) -> Result<Option<f64>, SensorError> {
        let cfg = &self.ctx.config;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let problem = match self.sensor.read() {
                Ok(raw) => match validate_reading(raw, cfg.plausible_min_celsius, cfg.plausible_max_celsius) {
                    Ok(value) => return Ok(Some(value)),
                    Err(why) => format!("discarded reading {raw}: {why}"),
                },
                Err(SensorError::Transient(msg)) => format!("transient sensor error: {msg}"),
                Err(fatal) => return Err(fatal),
            };
            debug!("{problem} (attempt {attempt})");
            if attempt == STALL_REPORT_ATTEMPTS {
                self.ctx.reporter.report(&format!(
                    "No valid reading after {attempt} attempts.\n{problem}"
                ));
            } else if attempt % STALL_REPORT_ATTEMPTS == 0 {
                warn!("no valid reading after {attempt} attempts");
            }
            if self.ctx.shutdown.wait(cfg.sensor_retry_backoff) {
                return Ok(None);
            }
        }
    }

    fn evaluate_alert(&mut self, value: f64, now: DateTime<Utc>) {
        if !self.alert.should_notify(value, now) {
            return;
        }
        let text = self.alert.message(value);
        match self.ctx.transport.send_text(self.ctx.config.authorized_channel_id, &text) {
            Ok(()) => {
                self.alert.mark_notified(now);
                self.sink.emit(&AppEvent::AlertRaised {
                    value,
                    threshold: self.alert.threshold(),
                });
            }
            Err(e) => warn!("alert notification failed, will retry on next crossing: {e}"),
        }
    }
}
