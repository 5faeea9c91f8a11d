//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements      | Connects to                 |
//! |-------------|-----------------|-----------------------------|
//! | `chart`     | ChartRenderer   | PNG via `embedded-graphics` |
//! | `log_file`  | (logger setup)  | `env_logger` → file + stderr|
//! | `log_sink`  | EventSink       | `log` facade                |
//! | `telegram`  | ChatTransport   | Telegram Bot API (HTTPS)    |
//! | `time`      | Clock           | system real-time clock      |
//!
//! Sensor drivers live in [`crate::sensors`].

pub mod chart;
pub mod log_file;
pub mod log_sink;
pub mod telegram;
pub mod time;
