//! Telegram Bot API transport.
//!
//! Implements [`ChatTransport`] over plain HTTPS with `ureq`:
//!
//! | Operation          | Bot API method  | Body                     |
//! |--------------------|-----------------|--------------------------|
//! | `send_text`        | `sendMessage`   | JSON                     |
//! | `send_image`       | `sendPhoto`     | `multipart/form-data`    |
//! | `send_document`    | `sendDocument`  | `multipart/form-data`    |
//! | `receive_commands` | `getUpdates`    | long-poll, 30 s timeout  |
//!
//! Network failures (DNS, connect, read timeout) map to
//! [`TransportError::Connectivity`]; a well-formed error reply from the
//! API maps to [`TransportError::Api`].  The bot token is part of every
//! URL and is scrubbed from all error text.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::DateTime;
use log::{debug, trace};
use serde::Deserialize;
use serde_json::json;
use ureq::{Agent, AgentBuilder};

use crate::app::commands::Command;
use crate::app::ports::{ChannelId, ChatTransport};
use crate::error::TransportError;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Server-side long-poll duration for `getUpdates`.
const LONG_POLL_SECS: u64 = 30;
/// Socket read timeout; must exceed the long-poll duration.
const READ_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_SECS + 10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

const REDACTED: &str = "<token>";

// ───────────────────────────────────────────────────────────────
// Wire types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Decode("reply without result".into())),
            (false, _) => Err(TransportError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    /// Unix seconds.
    date: i64,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: ChannelId,
}

/// Turn a `getUpdates` batch into commands and the next offset to ask for.
/// Updates without a text message are acknowledged but produce no command.
fn commands_from_updates(updates: Vec<Update>) -> (Vec<Command>, Option<i64>) {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let commands = updates
        .into_iter()
        .filter_map(|u| {
            let message = u.message?;
            let text = message.text?;
            let received_at = DateTime::from_timestamp(message.date, 0)?;
            Some(Command::new(message.chat.id, text, received_at))
        })
        .collect();
    (commands, next_offset)
}

// ───────────────────────────────────────────────────────────────
// Multipart encoding
// ───────────────────────────────────────────────────────────────

/// Minimal `multipart/form-data` body builder.
struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.part_header(&format!("Content-Disposition: form-data; name=\"{name}\""), None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        let file_name = file_name.replace(['"', '\r', '\n'], "_");
        self.part_header(
            &format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\""),
            Some(content_type),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn part_header(&mut self, disposition: &str, content_type: Option<&str>) {
        self.body.extend_from_slice(format!("--{}\r\n{disposition}\r\n", self.boundary).as_bytes());
        if let Some(ct) = content_type {
            self.body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        self.body.extend_from_slice(b"\r\n");
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (self.content_type(), self.body)
    }
}

fn fresh_boundary() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("thermowatch-{nanos:x}")
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

pub struct TelegramTransport {
    agent: Agent,
    base_url: String,
    token: String,
    offset: AtomicI64,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Point the transport at a different Bot API server.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            offset: AtomicI64::new(0),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.token, REDACTED)
        }
    }

    /// Map a `ureq` outcome onto the Bot API envelope.
    fn decode<T: serde::de::DeserializeOwned>(
        &self,
        outcome: Result<ureq::Response, ureq::Error>,
    ) -> Result<T, TransportError> {
        let response = match outcome {
            Ok(response) => response,
            // Error replies still carry the JSON envelope.
            Err(ureq::Error::Status(code, response)) => {
                return match response.into_json::<ApiResponse<serde_json::Value>>() {
                    Ok(envelope) => Err(match envelope.into_result() {
                        Err(api) => api,
                        Ok(_) => TransportError::Api {
                            code: i64::from(code),
                            description: format!("HTTP {code}"),
                        },
                    }),
                    Err(_) => Err(TransportError::Api {
                        code: i64::from(code),
                        description: format!("HTTP {code}"),
                    }),
                };
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(TransportError::Connectivity(self.redact(&t.to_string())));
            }
        };
        response
            .into_json::<ApiResponse<T>>()
            .map_err(|e| TransportError::Decode(self.redact(&e.to_string())))?
            .into_result()
    }

    fn send_file(
        &self,
        method: &str,
        field: &str,
        channel: ChannelId,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let (ct, body) = MultipartForm::new(fresh_boundary())
            .text("chat_id", &channel.to_string())
            .file(field, file_name, content_type, bytes)
            .finish();
        trace!("{method}: {} bytes to {channel}", body.len());
        let outcome = self
            .agent
            .post(&self.url(method))
            .set("Content-Type", &ct)
            .send_bytes(&body);
        self.decode::<serde_json::Value>(outcome).map(drop)
    }
}

impl ChatTransport for TelegramTransport {
    fn send_text(&self, channel: ChannelId, text: &str) -> Result<(), TransportError> {
        let outcome = self
            .agent
            .post(&self.url("sendMessage"))
            .send_json(json!({ "chat_id": channel, "text": text }));
        self.decode::<serde_json::Value>(outcome).map(drop)
    }

    fn send_image(&self, channel: ChannelId, png: &[u8]) -> Result<(), TransportError> {
        self.send_file("sendPhoto", "photo", channel, "chart.png", "image/png", png)
    }

    fn send_document(
        &self,
        channel: ChannelId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        self.send_file(
            "sendDocument",
            "document",
            channel,
            file_name,
            "application/octet-stream",
            bytes,
        )
    }

    fn receive_commands(&self) -> Result<Vec<Command>, TransportError> {
        let offset = self.offset.load(Ordering::Acquire);
        let outcome = self
            .agent
            .get(&self.url("getUpdates"))
            .query("offset", &offset.to_string())
            .query("timeout", &LONG_POLL_SECS.to_string())
            .call();
        let updates: Vec<Update> = self.decode(outcome)?;
        let (commands, next) = commands_from_updates(updates);
        if let Some(next) = next {
            self.offset.fetch_max(next, Ordering::AcqRel);
        }
        if !commands.is_empty() {
            debug!("received {} command(s)", commands.len());
        }
        Ok(commands)
    }
}
