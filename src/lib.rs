//! Thermowatch library.
//!
//! A temperature monitor with a chat interface: one thread samples a
//! sensor into a retained time series and raises threshold alerts, the
//! other answers chat commands (current value, chart, log file) from that
//! series.  Everything the binary wires together is exposed here for the
//! integration tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod alert;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod sensors;
pub mod shutdown;
pub mod store;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use shutdown::Shutdown;
pub use store::{Reading, SharedSeries, TimeSeries};
