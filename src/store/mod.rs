//! Time-series store: the rolling temperature history.
//!
//! [`TimeSeries`] is a plain ordered `Vec` of [`Reading`]s with the
//! retention and windowing operations.  [`SharedSeries`] wraps it in a
//! reader/writer lock so the sampling loop (sole writer) and the command
//! server (reader) never observe a half-updated series.
//!
//! ```text
//!  SamplingLoop ──append/trim──▶ ┌──────────────┐ ◀──latest/window── CommandServer
//!                                │ SharedSeries │
//!                                └──────────────┘
//!                                       │ persist / load
//!                                       ▼
//!                                  data file (CSV)
//! ```

mod file;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A single temperature sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// `None` when a persisted row carried no value.
    pub value_celsius: Option<f64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value_celsius: f64) -> Self {
        Self {
            timestamp,
            value_celsius: Some(value_celsius),
        }
    }

    pub fn missing(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            value_celsius: None,
        }
    }
}

/// `now - age`, or `None` when that lies before the representable range.
fn cutoff(now: DateTime<Utc>, age: TimeDelta) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(age)
}

/// Readings ordered by timestamp (non-decreasing).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    readings: Vec<Reading>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary readings, restoring timestamp order.
    pub fn from_readings(mut readings: Vec<Reading>) -> Self {
        if !readings.is_sorted_by_key(|r| r.timestamp) {
            readings.sort_by_key(|r| r.timestamp);
        }
        Self { readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    /// Append a reading.  Returns `false` (and keeps the series untouched)
    /// if the reading is older than the newest stored one.
    pub fn append(&mut self, reading: Reading) -> bool {
        if let Some(last) = self.readings.last() {
            if reading.timestamp < last.timestamp {
                warn!(
                    "rejecting out-of-order reading at {} (newest is {})",
                    reading.timestamp, last.timestamp
                );
                return false;
            }
        }
        self.readings.push(reading);
        true
    }

    /// Drop every reading with `timestamp + max_age <= now`.
    /// Returns how many readings were removed.
    pub fn trim(&mut self, now: DateTime<Utc>, max_age: TimeDelta) -> usize {
        let Some(limit) = cutoff(now, max_age) else {
            return 0;
        };
        let expired = self.readings.partition_point(|r| r.timestamp <= limit);
        self.readings.drain(..expired);
        expired
    }

    /// The suffix of readings with `timestamp + duration > now`.
    pub fn window(&self, now: DateTime<Utc>, duration: TimeDelta) -> TimeSeries {
        let start = match cutoff(now, duration) {
            Some(limit) => self.readings.partition_point(|r| r.timestamp <= limit),
            None => 0,
        };
        TimeSeries {
            readings: self.readings[start..].to_vec(),
        }
    }

    /// Newest reading.
    pub fn latest(&self) -> Result<Reading, StoreError> {
        self.readings.last().copied().ok_or(StoreError::Empty)
    }

    pub fn first(&self) -> Option<&Reading> {
        self.readings.first()
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a Reading;
    type IntoIter = core::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

// ───────────────────────────────────────────────────────────────
// Shared handle
// ───────────────────────────────────────────────────────────────

/// Cloneable, lock-protected handle to the process-wide series.
///
/// Locks are held only for the duration of a single operation; readers
/// get owned copies so rendering and sending never block the writer.
#[derive(Debug, Clone, Default)]
pub struct SharedSeries {
    inner: Arc<RwLock<TimeSeries>>,
}

impl SharedSeries {
    pub fn new(series: TimeSeries) -> Self {
        Self {
            inner: Arc::new(RwLock::new(series)),
        }
    }

    pub fn append(&self, reading: Reading) -> bool {
        self.inner.write().append(reading)
    }

    pub fn trim(&self, now: DateTime<Utc>, max_age: TimeDelta) -> usize {
        self.inner.write().trim(now, max_age)
    }

    pub fn latest(&self) -> Result<Reading, StoreError> {
        self.inner.read().latest()
    }

    pub fn window(&self, now: DateTime<Utc>, duration: TimeDelta) -> TimeSeries {
        self.inner.read().window(now, duration)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Owned copy of the whole series.
    pub fn snapshot(&self) -> TimeSeries {
        self.inner.read().clone()
    }

    /// Persist a snapshot; the lock is released before any file I/O.
    /// Returns the number of readings written.
    pub fn persist(&self, path: &Path) -> Result<usize, StoreError> {
        let snapshot = self.snapshot();
        snapshot.persist(path)?;
        Ok(snapshot.len())
    }
}
