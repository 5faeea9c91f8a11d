//! CommandServer integration tests: authorization, staleness, every
//! command handler and the error/escalation paths.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::TimeDelta;

use thermowatch::app::server::{CommandServer, HELP_TEXT, NO_DATA_TEXT, UNKNOWN_TEXT};
use thermowatch::error::TransportError;
use thermowatch::{Reading, TimeSeries};

use crate::mocks::{AUTHORIZED, ERRORS, Harness, STRANGER, Sent, t0};

fn harness_with_readings(values: &[(i64, f64)]) -> Harness {
    let series = TimeSeries::from_readings(
        values
            .iter()
            .map(|(min, v)| Reading::new(t0() + TimeDelta::minutes(*min), *v))
            .collect(),
    );
    let h = Harness::with(series, |_| {});
    if let Some((last, _)) = values.last() {
        h.clock.advance(TimeDelta::minutes(*last));
    }
    h
}

// ── current-value ─────────────────────────────────────────────

#[test]
fn current_value_reports_latest_reading() {
    let h = harness_with_readings(&[(0, 21.0), (1, 23.0)]);
    let mut server = CommandServer::new(h.ctx.clone());

    server.handle(&h.command(AUTHORIZED, "current-value"));

    let replies = h.transport.texts_to(AUTHORIZED);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("Current temperature: 23\u{00b0}C (at "), "{replies:?}");
    assert!(replies[0].ends_with(')'));
}

#[test]
fn current_value_without_data() {
    let h = Harness::new();
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(AUTHORIZED, "current-value"));
    assert_eq!(h.transport.texts_to(AUTHORIZED), vec![NO_DATA_TEXT.to_string()]);
}

#[test]
fn current_value_with_missing_latest_value() {
    let series = TimeSeries::from_readings(vec![Reading::new(t0(), 20.0), Reading::missing(t0() + TimeDelta::minutes(1))]);
    let h = Harness::with(series, |_| {});
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(AUTHORIZED, "current-value"));
    assert_eq!(h.transport.texts_to(AUTHORIZED), vec![NO_DATA_TEXT.to_string()]);
}

// ── Authorization + staleness ─────────────────────────────────

#[test]
fn unauthorized_sender_gets_no_reply() {
    let h = harness_with_readings(&[(0, 21.0)]);
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(STRANGER, "current-value"));
    server.handle(&h.command(STRANGER, "log"));
    assert!(h.transport.sent().is_empty());
    assert_eq!(server.handled(), 0);
}

#[test]
fn stale_command_gets_no_reply() {
    let h = harness_with_readings(&[(0, 21.0)]);
    let mut server = CommandServer::new(h.ctx.clone());
    let command = h.command(AUTHORIZED, "current-value");
    h.clock.advance(TimeDelta::seconds(10));

    server.handle(&command);
    assert!(h.transport.sent().is_empty());
}

#[test]
fn command_just_under_threshold_is_answered() {
    let h = harness_with_readings(&[(0, 21.0)]);
    let mut server = CommandServer::new(h.ctx.clone());
    let command = h.command(AUTHORIZED, "help");
    h.clock.advance(TimeDelta::milliseconds(4999));

    server.handle(&command);
    assert_eq!(h.transport.texts_to(AUTHORIZED), vec![HELP_TEXT.to_string()]);
}

// ── chart ─────────────────────────────────────────────────────

#[test]
fn chart_zero_is_ignored() {
    let h = harness_with_readings(&[(0, 21.0)]);
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(AUTHORIZED, "chart 0"));
    assert!(h.transport.sent().is_empty());
    assert!(h.renderer.calls.lock().is_empty());
}

#[test]
fn chart_with_empty_window_still_sends_image() {
    let h = harness_with_readings(&[(0, 21.0)]);
    h.clock.advance(TimeDelta::hours(5));
    let mut server = CommandServer::new(h.ctx.clone());

    server.handle(&h.command(AUTHORIZED, "chart 3"));

    assert_eq!(*h.renderer.calls.lock(), vec![(0, 3)]);
    assert_eq!(h.transport.sent(), vec![Sent::Image { channel: AUTHORIZED, bytes: 4 }]);
}

#[test]
fn chart_renders_requested_window() {
    let h = harness_with_readings(&[(0, 20.0), (60, 21.0), (120, 22.0), (180, 23.0)]);
    let mut server = CommandServer::new(h.ctx.clone());

    server.handle(&h.command(AUTHORIZED, "chart 2"));

    // now = t0 + 3 h; readings at +1 h (boundary) is excluded.
    assert_eq!(*h.renderer.calls.lock(), vec![(2, 2)]);
}

#[test]
fn chart_hours_clamped_to_retention() {
    let h = Harness::with(TimeSeries::new(), |c| {
        c.retention_window = Duration::from_secs(48 * 3600);
        c.trim_interval = Duration::from_secs(3600);
    });
    let mut server = CommandServer::new(h.ctx.clone());

    server.handle(&h.command(AUTHORIZED, "chart 1000"));
    assert_eq!(*h.renderer.calls.lock(), vec![(0, 48)]);
}

#[test]
fn non_numeric_chart_is_unknown() {
    let h = Harness::new();
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(AUTHORIZED, "chart three"));

    let replies = h.transport.texts_to(AUTHORIZED);
    assert_eq!(replies, vec![format!("{UNKNOWN_TEXT}\n\n{HELP_TEXT}")]);
    assert!(h.renderer.calls.lock().is_empty());
}

// ── log / help / unknown ──────────────────────────────────────

#[test]
fn log_sends_log_file_as_document() {
    let h = Harness::new();
    std::fs::write(&h.ctx.config.log_file, "2024-06-01T12:00:00.000Z INFO  x: started\n").unwrap();
    let mut server = CommandServer::new(h.ctx.clone());

    server.handle(&h.command(AUTHORIZED, "log"));

    assert_eq!(
        h.transport.sent(),
        vec![Sent::Document {
            channel: AUTHORIZED,
            name: "monitor.log".into(),
            bytes: 42,
        }]
    );
}

#[test]
fn commands_are_case_sensitive() {
    let h = Harness::new();
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(AUTHORIZED, "Help"));
    assert!(h.transport.texts_to(AUTHORIZED)[0].starts_with(UNKNOWN_TEXT));
}

// ── Errors + escalation ───────────────────────────────────────

#[test]
fn handler_errors_escalate_once_per_cooldown() {
    let h = Harness::new();
    h.renderer.fail.store(true, Ordering::SeqCst);
    let mut server = CommandServer::new(h.ctx.clone());

    for _ in 0..10 {
        server.handle(&h.command(AUTHORIZED, "chart 3"));
        h.clock.advance(TimeDelta::minutes(5));
    }

    assert_eq!(h.renderer.calls.lock().len(), 10);
    let escalations = h.transport.texts_to(ERRORS);
    assert_eq!(escalations, vec!["render: encoding failed: stub failure".to_string()]);
    assert!(h.transport.texts_to(AUTHORIZED).is_empty());
}

#[test]
fn missing_log_file_is_reported() {
    let h = Harness::new();
    let mut server = CommandServer::new(h.ctx.clone());
    server.handle(&h.command(AUTHORIZED, "log"));

    assert!(h.transport.texts_to(AUTHORIZED).is_empty());
    assert_eq!(h.transport.texts_to(ERRORS).len(), 1);
}

#[test]
fn connectivity_errors_never_escalate() {
    let h = Harness::new();
    for _ in 0..5 {
        h.transport.push_error(TransportError::Connectivity("dns failure".into()));
    }
    let mut server = CommandServer::new(h.ctx.clone());
    for _ in 0..5 {
        server.poll_once();
        h.clock.advance(TimeDelta::minutes(10));
    }

    assert_eq!(h.transport.polls(), 5);
    assert!(h.transport.sent().is_empty());
}

#[test]
fn other_receive_errors_are_reported() {
    let h = Harness::new();
    h.transport.push_error(TransportError::Api {
        code: 409,
        description: "Conflict: terminated by other getUpdates request".into(),
    });
    let mut server = CommandServer::new(h.ctx.clone());
    server.poll_once();

    assert_eq!(h.transport.texts_to(ERRORS).len(), 1);
}

#[test]
fn poll_handles_whole_batch() {
    let h = harness_with_readings(&[(0, 24.0)]);
    h.transport.push_batch(vec![
        h.command(AUTHORIZED, "current-value"),
        h.command(STRANGER, "current-value"),
        h.command(AUTHORIZED, "help"),
    ]);
    let mut server = CommandServer::new(h.ctx.clone());
    server.poll_once();

    assert_eq!(server.handled(), 2);
    assert_eq!(h.transport.texts_to(AUTHORIZED).len(), 2);
    assert!(h.transport.texts_to(STRANGER).is_empty());
}

#[test]
fn run_exits_once_shutdown_is_triggered() {
    let h = Harness::new();
    let ctx = h.ctx.clone();
    let handle = std::thread::spawn(move || CommandServer::new(ctx).run());

    std::thread::sleep(Duration::from_millis(20));
    h.ctx.shutdown.trigger();
    handle.join().unwrap();
    assert!(h.transport.polls() > 0);
}
