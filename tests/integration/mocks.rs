//! Mock adapters for integration tests.
//!
//! Records every transport call so tests can assert on the full message
//! history without a chat service, and drives time by hand.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;

use thermowatch::app::commands::Command;
use thermowatch::app::context::MonitorContext;
use thermowatch::app::events::AppEvent;
use thermowatch::app::ports::{ChannelId, ChartRenderer, ChatTransport, Clock, EventSink, SensorPort};
use thermowatch::error::{RenderError, SensorError, TransportError};
use thermowatch::{MonitorConfig, SharedSeries, Shutdown, TimeSeries};

pub const AUTHORIZED: ChannelId = 7;
pub const ERRORS: ChannelId = 99;
pub const STRANGER: ChannelId = 12345;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

// ── Transport ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { channel: ChannelId, text: String },
    Image { channel: ChannelId, bytes: usize },
    Document { channel: ChannelId, name: String, bytes: usize },
}

#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    inbox: Mutex<VecDeque<Result<Vec<Command>, TransportError>>>,
    fail_sends: AtomicBool,
    polls: AtomicUsize,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn push_batch(&self, commands: Vec<Command>) {
        self.inbox.lock().push_back(Ok(commands));
    }

    pub fn push_error(&self, err: TransportError) {
        self.inbox.lock().push_back(Err(err));
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn texts_to(&self, channel: ChannelId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { channel: c, text } if *c == channel => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Connectivity("mock offline".into()));
        }
        self.sent.lock().push(sent);
        Ok(())
    }
}

impl ChatTransport for MockTransport {
    fn send_text(&self, channel: ChannelId, text: &str) -> Result<(), TransportError> {
        self.record(Sent::Text { channel, text: text.to_string() })
    }

    fn send_image(&self, channel: ChannelId, png: &[u8]) -> Result<(), TransportError> {
        self.record(Sent::Image { channel, bytes: png.len() })
    }

    fn send_document(&self, channel: ChannelId, file_name: &str, bytes: &[u8]) -> Result<(), TransportError> {
        self.record(Sent::Document {
            channel,
            name: file_name.to_string(),
            bytes: bytes.len(),
        })
    }

    fn receive_commands(&self) -> Result<Vec<Command>, TransportError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.inbox.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ── Sensor ────────────────────────────────────────────────────

/// Replays a fixed script of read results; fatal once exhausted.
pub struct ScriptedSensor {
    script: VecDeque<Result<f64, SensorError>>,
    pub released: Arc<AtomicBool>,
    pub reads: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(script: impl IntoIterator<Item = Result<f64, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            released: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn values(values: &[f64]) -> Self {
        Self::new(values.iter().map(|v| Ok(*v)))
    }
}

impl SensorPort for ScriptedSensor {
    fn read(&mut self) -> Result<f64, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(SensorError::Fatal("script exhausted".into())))
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

// ── Renderer ──────────────────────────────────────────────────

/// Records `(window length, hours)` per call; returns a tiny fake PNG.
#[derive(Default)]
pub struct StubRenderer {
    pub calls: Mutex<Vec<(usize, u32)>>,
    pub fail: AtomicBool,
}

impl ChartRenderer for StubRenderer {
    fn render(&self, window: &TimeSeries, hours: u32) -> Result<Vec<u8>, RenderError> {
        self.calls.lock().push((window.len(), hours));
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::Encode("stub failure".into()));
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<AppEvent>>>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.lock().push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// A fully wired context over mocks and a scratch directory.
pub struct Harness {
    pub dir: TempDir,
    pub transport: Arc<MockTransport>,
    pub clock: Arc<ManualClock>,
    pub renderer: Arc<StubRenderer>,
    pub ctx: MonitorContext,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with(TimeSeries::new(), |_| {})
    }

    pub fn with(series: TimeSeries, tweak: impl FnOnce(&mut MonitorConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MonitorConfig {
            api_key: "test-key".into(),
            authorized_channel_id: AUTHORIZED,
            error_channel_id: ERRORS,
            sample_interval: Duration::ZERO,
            sensor_retry_backoff: Duration::ZERO,
            reconnect_backoff: Duration::ZERO,
            data_file: dir.path().join("series.csv"),
            log_file: dir.path().join("monitor.log"),
            ..MonitorConfig::default()
        };
        tweak(&mut config);

        let transport = Arc::new(MockTransport::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let renderer = Arc::new(StubRenderer::default());
        let ctx = MonitorContext::new(
            config,
            SharedSeries::new(series),
            transport.clone(),
            renderer.clone(),
            clock.clone(),
            Shutdown::new(),
        );
        Self {
            dir,
            transport,
            clock,
            renderer,
            ctx,
        }
    }

    /// A command from `channel` stamped with the current mock time.
    pub fn command(&self, channel: ChannelId, text: &str) -> Command {
        Command::new(channel, text, self.clock.now())
    }
}
