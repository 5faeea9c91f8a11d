//! Thermowatch main entry point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TemperatureSource  TelegramTransport  PngChartRenderer        │
//! │  (SensorPort)       (ChatTransport)    (ChartRenderer)         │
//! │  SystemClock        LogEventSink                               │
//! │  (Clock)            (EventSink)                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────┐        ┌──────────────────────┐      │
//! │  │ SamplingLoop         │ writes │ CommandServer        │      │
//! │  │ (thread "sampling")  │──────▶ │ (thread "commands")  │      │
//! │  └──────────────────────┘ Shared └──────────────────────┘      │
//! │                           Series                               │
//! │  CriticalFailureReporter · Shutdown                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When either loop ends (shutdown, fatal sensor fault, panic) the other
//! is told to stop and both threads are joined.  A fatal sensor fault or a
//! panic makes the process exit non-zero so a supervisor can restart it.

#![deny(unused_must_use)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use crossbeam_channel::Sender;
use log::info;

use thermowatch::adapters::chart::PngChartRenderer;
use thermowatch::adapters::log_file;
use thermowatch::adapters::log_sink::LogEventSink;
use thermowatch::adapters::telegram::TelegramTransport;
use thermowatch::adapters::time::SystemClock;
use thermowatch::app::context::MonitorContext;
use thermowatch::app::ports::ChatTransport;
use thermowatch::app::sampling::SamplingLoop;
use thermowatch::app::server::CommandServer;
use thermowatch::diagnostics;
use thermowatch::sensors::TemperatureSource;
use thermowatch::{MonitorConfig, SharedSeries, Shutdown, TimeSeries};

/// Announces a loop's end on drop, so a panicking thread is noticed too.
struct DoneGuard {
    done: Sender<&'static str>,
    name: &'static str,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.done.send(self.name);
    }
}

/// Join a loop thread; a panic is escalated and yields `None`.
fn join<T>(handle: JoinHandle<T>, ctx: &MonitorContext) -> Option<T> {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            ctx.reporter
                .report(&format!("The {name} thread panicked, see the log for details."));
            None
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Configuration + logging ────────────────────────────
    let config = MonitorConfig::from_env().context("loading configuration")?;
    log_file::init(&config.log_file)?;
    diagnostics::install_panic_handler();

    info!("thermowatch v{} starting", env!("CARGO_PKG_VERSION"));
    info!("config: {}", config.redacted_json());

    // ── 2. Persisted series ───────────────────────────────────
    let series = TimeSeries::load(&config.data_file)
        .with_context(|| format!("loading {}", config.data_file.display()))?;

    // ── 3. Adapters + shared context ──────────────────────────
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(config.api_key.clone()));
    let ctx = MonitorContext::new(
        config,
        SharedSeries::new(series),
        transport,
        Arc::new(PngChartRenderer::default()),
        Arc::new(SystemClock),
        Shutdown::new(),
    );

    let sensor = match TemperatureSource::open(&ctx.config.sensor) {
        Ok(sensor) => sensor,
        Err(e) => {
            ctx.reporter.report(&format!("Opening the sensor failed:\n{e}"));
            return Err(e).context("opening sensor");
        }
    };

    // ── 4. Loop threads ───────────────────────────────────────
    let (done_tx, done_rx) = crossbeam_channel::bounded::<&'static str>(2);

    let sampling = {
        let ctx = ctx.clone();
        let done = done_tx.clone();
        thread::Builder::new()
            .name("sampling".into())
            .spawn(move || {
                let _guard = DoneGuard { done, name: "sampling" };
                SamplingLoop::new(ctx, sensor, LogEventSink::new()).run()
            })
            .context("spawning sampling thread")?
    };

    let commands = {
        let ctx = ctx.clone();
        let done = done_tx;
        thread::Builder::new()
            .name("commands".into())
            .spawn(move || {
                let _guard = DoneGuard { done, name: "commands" };
                CommandServer::new(ctx).run();
            })
            .context("spawning command thread")?
    };

    info!("monitor running");

    // ── 5. First loop to end stops the other ──────────────────
    let first = done_rx.recv().unwrap_or("unknown");
    info!("{first} loop ended, stopping");
    ctx.shutdown.trigger();

    let sampled = join(sampling, &ctx);
    let served = join(commands, &ctx);
    info!("monitor stopped");

    match (sampled, served) {
        (Some(Err(e)), _) => Err(e).context("sampling stopped"),
        (None, _) => bail!("sampling thread panicked"),
        (_, None) => bail!("command thread panicked"),
        (Some(Ok(())), Some(())) => Ok(()),
    }
}
