//! Flat-file persistence for [`TimeSeries`].
//!
//! Two-column CSV with a `datetime,value` header, one row per reading in
//! append order.  Timestamps are written as RFC 3339 UTC.  Files produced
//! by older deployments with naive `YYYY-MM-DD HH:MM:SS[.ffffff]` local
//! timestamps load as well, and an empty value column is a missing value.
//!
//! Writes go to a sibling `*.tmp` file which is synced and then renamed
//! over the target, so a crash mid-write leaves the previous file intact.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use log::{debug, info, warn};

use super::{Reading, TimeSeries};
use crate::error::StoreError;

const HEADER: &str = "datetime,value";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl TimeSeries {
    /// Load a persisted series.  An absent file yields an empty series;
    /// unreadable or malformed content is an error.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no data file at {}, starting with an empty series", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let series = parse(&text)?;
        info!("loaded {} readings from {}", series.len(), path.display());
        Ok(series)
    }

    /// Write the whole series to `path` atomically (temp file + rename).
    pub fn persist(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        if let Err(e) = self.write_replacing(&tmp, path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!("cannot remove {}: {cleanup}", tmp.display());
                }
            }
            return Err(e.into());
        }
        debug!("persisted {} readings to {}", self.len(), path.display());
        Ok(())
    }

    fn write_replacing(&self, tmp: &Path, path: &Path) -> io::Result<()> {
        {
            let mut out = BufWriter::new(File::create(tmp)?);
            writeln!(out, "{HEADER}")?;
            for reading in self {
                write_row(&mut out, reading)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(tmp, path)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_row(out: &mut impl Write, reading: &Reading) -> io::Result<()> {
    let ts = reading.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
    match reading.value_celsius {
        Some(v) => writeln!(out, "{ts},{v}"),
        None => writeln!(out, "{ts},"),
    }
}

fn parse(text: &str) -> Result<TimeSeries, StoreError> {
    let mut rows = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    match rows.next() {
        None => return Ok(TimeSeries::new()),
        Some((_, header)) if header == HEADER => {}
        Some((line, header)) => {
            return Err(StoreError::Malformed {
                line,
                reason: format!("expected header '{HEADER}', found '{header}'"),
            });
        }
    }

    let mut readings = Vec::new();
    for (line, row) in rows {
        readings.push(parse_row(row).map_err(|reason| StoreError::Malformed { line, reason })?);
    }
    Ok(TimeSeries::from_readings(readings))
}

fn parse_row(row: &str) -> Result<Reading, String> {
    let (ts, value) = row
        .split_once(',')
        .ok_or_else(|| format!("expected two columns, found '{row}'"))?;
    let timestamp = parse_timestamp(ts.trim()).ok_or_else(|| format!("bad timestamp '{ts}'"))?;
    let value = value.trim();
    if value.is_empty() {
        return Ok(Reading::missing(timestamp));
    }
    let celsius: f64 = value.parse().map_err(|_| format!("bad value '{value}'"))?;
    if celsius.is_nan() {
        return Ok(Reading::missing(timestamp));
    }
    if celsius.is_infinite() {
        return Err(format!("non-finite value '{value}'"));
    }
    Ok(Reading::new(timestamp, celsius))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(s, fmt).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}
