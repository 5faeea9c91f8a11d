//! Inbound commands from the chat transport.
//!
//! A [`Command`] is the raw message; [`CommandKind`] is its parsed form
//! against the fixed grammar:
//!
//! | text             | effect                                   |
//! |------------------|------------------------------------------|
//! | `current-value`  | latest reading as text                   |
//! | `chart <hours>`  | chart of the last `<hours>` hours        |
//! | `log`            | log file as a document                   |
//! | `help`           | help text                                |
//!
//! Matching is literal and case-sensitive.

use chrono::{DateTime, TimeDelta, Utc};

use super::ports::ChannelId;

/// Message received from a chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub sender_channel_id: ChannelId,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Command {
    pub fn new(sender_channel_id: ChannelId, text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            sender_channel_id,
            text: text.into(),
            received_at,
        }
    }

    /// A command is fresh while `now - received_at < threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        now.signed_duration_since(self.received_at) >= threshold
    }
}

/// Parsed command grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    CurrentValue,
    Chart { hours: u32 },
    Log,
    Help,
    Unknown,
}

impl CommandKind {
    pub fn parse(text: &str) -> Self {
        match text {
            "current-value" => Self::CurrentValue,
            "log" => Self::Log,
            "help" => Self::Help,
            _ => text
                .strip_prefix("chart ")
                .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|n| n.parse().ok())
                .map_or(Self::Unknown, |hours| Self::Chart { hours }),
        }
    }
}
