//! SamplingLoop integration tests: acquisition, alerts, maintenance and
//! the fatal-fault exit path.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::TimeDelta;

use thermowatch::app::events::AppEvent;
use thermowatch::app::sampling::SamplingLoop;
use thermowatch::error::{MonitorError, SensorError};
use thermowatch::{Reading, TimeSeries};

use crate::mocks::{AUTHORIZED, ERRORS, Harness, RecordingSink, ScriptedSensor, t0};

fn transient() -> Result<f64, SensorError> {
    Err(SensorError::Transient("checksum mismatch".into()))
}

// ── Alerts ────────────────────────────────────────────────────

#[test]
fn alert_fires_once_per_cooldown() {
    let h = Harness::new();
    let sink = RecordingSink::default();
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::values(&[31.0, 32.0, 29.0, 33.0]),
        sink.clone(),
    );

    for _ in 0..4 {
        sampling.tick().unwrap();
        h.clock.advance(TimeDelta::minutes(1));
    }

    let alerts = h.transport.texts_to(AUTHORIZED);
    assert_eq!(
        alerts,
        vec!["Temperature has exceeded the limit of 30\u{00b0}C and is now 31\u{00b0}C.".to_string()]
    );
    let raised: Vec<_> = sink
        .events
        .lock()
        .iter()
        .filter(|e| matches!(e, AppEvent::AlertRaised { .. }))
        .cloned()
        .collect();
    assert_eq!(raised, vec![AppEvent::AlertRaised { value: 31.0, threshold: 30.0 }]);
    assert_eq!(h.ctx.series.len(), 4);
}

#[test]
fn alert_repeats_after_cooldown() {
    let h = Harness::new();
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::values(&[31.0, 31.0, 31.0]),
        RecordingSink::default(),
    );

    sampling.tick().unwrap();
    h.clock.advance(TimeDelta::minutes(59));
    sampling.tick().unwrap();
    h.clock.advance(TimeDelta::minutes(1));
    sampling.tick().unwrap();

    assert_eq!(h.transport.texts_to(AUTHORIZED).len(), 2);
}

#[test]
fn below_direction_alerts_on_low_values() {
    let h = Harness::with(TimeSeries::new(), |c| {
        c.alert_direction = thermowatch::alert::AlertDirection::Below;
        c.alert_threshold_celsius = 5.0;
    });
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::values(&[6.0, 5.0]),
        RecordingSink::default(),
    );
    sampling.tick().unwrap();
    assert!(h.transport.texts_to(AUTHORIZED).is_empty());
    sampling.tick().unwrap();
    assert_eq!(
        h.transport.texts_to(AUTHORIZED),
        vec!["Temperature has fallen below the limit of 5\u{00b0}C and is now 5\u{00b0}C.".to_string()]
    );
}

#[test]
fn failed_alert_send_does_not_start_cooldown() {
    let h = Harness::new();
    let sink = RecordingSink::default();
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::values(&[31.0, 31.0]),
        sink.clone(),
    );
    let raised = |sink: &RecordingSink| {
        sink.events
            .lock()
            .iter()
            .filter(|e| matches!(e, AppEvent::AlertRaised { .. }))
            .count()
    };

    h.transport.set_fail_sends(true);
    sampling.tick().unwrap();
    assert!(h.transport.sent().is_empty());
    assert_eq!(raised(&sink), 0, "an undelivered alert is not announced");

    h.transport.set_fail_sends(false);
    h.clock.advance(TimeDelta::seconds(5));
    sampling.tick().unwrap();
    assert_eq!(h.transport.texts_to(AUTHORIZED).len(), 1);
    assert_eq!(raised(&sink), 1);
}

// ── Acquisition ───────────────────────────────────────────────

#[test]
fn transient_errors_are_retried_without_samples() {
    let h = Harness::new();
    let sensor = ScriptedSensor::new([transient(), transient(), Ok(22.0)]);
    let reads = sensor.reads.clone();
    let mut sampling = SamplingLoop::new(h.ctx.clone(), sensor, RecordingSink::default());

    let reading = sampling.tick().unwrap().unwrap();
    assert_eq!(reading.value_celsius, Some(22.0));
    assert_eq!(reads.load(Ordering::SeqCst), 3);
    assert_eq!(h.ctx.series.len(), 1);
    assert!(h.transport.sent().is_empty());
}

#[test]
fn implausible_values_are_discarded() {
    let h = Harness::new();
    let sensor = ScriptedSensor::values(&[22.5, f64::NAN, 200.0, -60.0, 21.0]);
    let mut sampling = SamplingLoop::new(h.ctx.clone(), sensor, RecordingSink::default());

    let reading = sampling.tick().unwrap().unwrap();
    assert_eq!(reading.value_celsius, Some(21.0));
    assert_eq!(h.ctx.series.snapshot().readings(), &[Reading::new(t0(), 21.0)]);
}

#[test]
fn long_rejection_run_is_escalated_once() {
    let h = Harness::new();
    let mut script = vec![23.5; 65];
    script.push(24.0);
    let mut sampling = SamplingLoop::new(h.ctx.clone(), ScriptedSensor::values(&script), RecordingSink::default());

    let reading = sampling.tick().unwrap().unwrap();
    assert_eq!(reading.value_celsius, Some(24.0));

    let escalations = h.transport.texts_to(ERRORS);
    assert_eq!(escalations, vec!["discarded reading 23.5: not a whole degree".to_string()]);
    assert!(h.transport.texts_to(AUTHORIZED).is_empty());
}

#[test]
fn shutdown_interrupts_retry_backoff() {
    let h = Harness::with(TimeSeries::new(), |c| {
        c.sensor_retry_backoff = Duration::from_secs(3600);
    });
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::new([transient(), Ok(22.0)]),
        RecordingSink::default(),
    );
    h.ctx.shutdown.trigger();

    assert_eq!(sampling.tick().unwrap(), None);
    assert!(h.ctx.series.is_empty());
}

// ── Fatal path ────────────────────────────────────────────────

#[test]
fn fatal_error_stops_releases_persists_and_escalates() {
    let h = Harness::new();
    let sensor = ScriptedSensor::new([Ok(22.0), Err(SensorError::Fatal("device gone".into()))]);
    let released = sensor.released.clone();
    let sink = RecordingSink::default();

    let result = SamplingLoop::new(h.ctx.clone(), sensor, sink.clone()).run();

    assert!(matches!(result, Err(MonitorError::Sensor(SensorError::Fatal(_)))));
    assert!(released.load(Ordering::SeqCst));

    let escalations = h.transport.texts_to(ERRORS);
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0].contains("device gone"), "{escalations:?}");

    let persisted = TimeSeries::load(&h.ctx.config.data_file).unwrap();
    assert_eq!(persisted.len(), 1);

    let events = sink.events.lock();
    assert_eq!(events.first(), Some(&AppEvent::Started { readings: 0 }));
    assert_eq!(events.last(), Some(&AppEvent::Stopped { fatal: true }));
}

#[test]
fn run_returns_ok_on_shutdown() {
    let h = Harness::with(TimeSeries::new(), |c| {
        c.sample_interval = Duration::from_secs(3600);
    });
    let sensor = ScriptedSensor::values(&[22.0]);
    let released = sensor.released.clone();
    let ctx = h.ctx.clone();
    let handle = std::thread::spawn(move || SamplingLoop::new(ctx, sensor, RecordingSink::default()).run());

    std::thread::sleep(Duration::from_millis(50));
    h.ctx.shutdown.trigger();

    assert!(handle.join().unwrap().is_ok());
    assert!(released.load(Ordering::SeqCst));
    assert!(h.transport.texts_to(ERRORS).is_empty());
    assert_eq!(TimeSeries::load(&h.ctx.config.data_file).unwrap().len(), 1);
}

// ── Maintenance ───────────────────────────────────────────────

#[test]
fn persists_after_persist_interval() {
    let h = Harness::new();
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::values(&[20.0, 21.0, 22.0]),
        RecordingSink::default(),
    );
    let data = h.ctx.config.data_file.clone();

    sampling.tick().unwrap();
    assert!(!data.exists());

    h.clock.advance(TimeDelta::seconds(30));
    sampling.tick().unwrap();
    assert!(!data.exists());

    h.clock.advance(TimeDelta::seconds(30));
    sampling.tick().unwrap();
    // Persisted during maintenance, before the third reading was appended.
    assert_eq!(TimeSeries::load(&data).unwrap().len(), 2);
}

#[test]
fn trims_expired_readings_after_trim_interval() {
    let week = TimeDelta::weeks(1);
    let old = TimeSeries::from_readings(vec![
        Reading::new(t0() - week * 6, 18.0),
        Reading::new(t0() - week * 4, 19.0),
    ]);
    let h = Harness::with(old, |_| {});
    let sink = RecordingSink::default();
    let mut sampling = SamplingLoop::new(h.ctx.clone(), ScriptedSensor::values(&[20.0, 21.0]), sink.clone());

    sampling.tick().unwrap();
    assert_eq!(h.ctx.series.len(), 3);

    h.clock.advance(TimeDelta::hours(1));
    sampling.tick().unwrap();

    assert!(
        sink.events
            .lock()
            .contains(&AppEvent::Trimmed { removed: 1, remaining: 2 })
    );
    assert_eq!(h.ctx.series.len(), 3);
    assert_eq!(TimeSeries::load(&h.ctx.config.data_file).unwrap().len(), 2);
}

#[test]
fn persist_failure_is_reported_and_sampling_continues() {
    let h = Harness::with(TimeSeries::new(), |c| {
        c.persist_interval = Duration::from_secs(1);
    });
    // A directory where the data file should be makes the final rename fail.
    std::fs::create_dir(&h.ctx.config.data_file).unwrap();
    let mut sampling = SamplingLoop::new(
        h.ctx.clone(),
        ScriptedSensor::values(&[20.0, 21.0]),
        RecordingSink::default(),
    );

    sampling.tick().unwrap();
    h.clock.advance(TimeDelta::seconds(2));
    let reading = sampling.tick().unwrap();

    assert_eq!(reading.and_then(|r| r.value_celsius), Some(21.0));
    assert_eq!(h.transport.texts_to(ERRORS).len(), 1);
    assert_eq!(h.ctx.series.len(), 2);
}
