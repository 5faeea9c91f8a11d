//! Logger initialization.
//!
//! `env_logger` with a fixed line format, piped into a writer that tees
//! every line to the durable log file and to stderr.  The filter comes
//! from `RUST_LOG` and defaults to `info`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use env_logger::{Env, Target};
use log::Level;

/// Appends to the log file and mirrors to stderr.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        // stderr is best effort; the file is the record.
        let _ = io::stderr().write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        io::stderr().flush()
    }
}

/// One log line, without the trailing newline.
pub fn format_line(at: DateTime<Utc>, level: Level, target: &str, message: &str) -> String {
    format!(
        "{} {level:<5} {target}: {message}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Install the global logger.  Fails if the log file cannot be opened or
/// a logger is already installed.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(Tee { file })))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_line(Utc::now(), record.level(), record.target(), &record.args().to_string())
            )
        })
        .try_init()
        .context("installing logger")?;
    Ok(())
}
