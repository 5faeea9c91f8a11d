//! Threshold alerting and cooldown gates.
//!
//! The sampling loop evaluates every accepted reading against the
//! [`AlertPolicy`] **after** it has been appended to the series.  A
//! notification is only sent when the reading crosses the threshold in
//! the configured direction *and* the notification cooldown has elapsed.
//!
//! ## Notification lifecycle
//!
//! 1. A reading crosses the threshold.
//! 2. [`AlertPolicy::should_notify`] checks the cooldown gate.
//! 3. The caller sends the notification.
//! 4. Only a successful send restarts the gate via
//!    [`AlertPolicy::mark_notified`]; a failed send is retried on the
//!    next crossing tick.
//!
//! [`Cooldown`] is the same gate used for escalation and for throttling
//! repeated log lines.

use core::fmt;
use core::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Convert a config duration into a chrono delta, saturating instead of failing.
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

// ───────────────────────────────────────────────────────────────
// Cooldown gate
// ───────────────────────────────────────────────────────────────

/// Minimum-spacing gate for repeatable notifications.
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: TimeDelta,
    last: Option<DateTime<Utc>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period: to_delta(period),
            last: None,
        }
    }

    /// True if the gate has never fired or `period` has elapsed since it last did.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self.last {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.period,
        }
    }

    /// Record that the gated action happened at `now`.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.last = Some(now);
    }

    /// Check and restart in one step.  Returns `true` if the action may run.
    pub fn try_fire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_ready(now) {
            self.restart(now);
            true
        } else {
            false
        }
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}

// ───────────────────────────────────────────────────────────────
// Alert direction
// ───────────────────────────────────────────────────────────────

/// Which side of the threshold counts as an alert condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    /// Alert when the reading reaches or exceeds the threshold.
    Above,
    /// Alert when the reading reaches or falls below the threshold.
    Below,
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
        }
    }
}

impl FromStr for AlertDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            _ => Err(()),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Alert policy
// ───────────────────────────────────────────────────────────────

/// Threshold + direction + cooldown, owned by the sampling loop.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    threshold_c: f64,
    direction: AlertDirection,
    cooldown: Cooldown,
}

impl AlertPolicy {
    pub fn new(threshold_c: f64, direction: AlertDirection, cooldown: Duration) -> Self {
        Self {
            threshold_c,
            direction,
            cooldown: Cooldown::new(cooldown),
        }
    }

    /// Whether `value` is on the alerting side of the threshold.
    pub fn crosses(&self, value: f64) -> bool {
        match self.direction {
            AlertDirection::Above => value >= self.threshold_c,
            AlertDirection::Below => value <= self.threshold_c,
        }
    }

    /// True if a notification for `value` should be sent now.
    pub fn should_notify(&self, value: f64, now: DateTime<Utc>) -> bool {
        if !self.crosses(value) {
            return false;
        }
        if self.cooldown.is_ready(now) {
            true
        } else {
            debug!("alert suppressed, cooldown active since {:?}", self.cooldown.last());
            false
        }
    }

    /// Restart the cooldown after a notification went out.
    pub fn mark_notified(&mut self, now: DateTime<Utc>) {
        self.cooldown.restart(now);
    }

    /// Human-readable notification text.
    pub fn message(&self, value: f64) -> String {
        let verb = match self.direction {
            AlertDirection::Above => "exceeded",
            AlertDirection::Below => "fallen below",
        };
        format!(
            "Temperature has {verb} the limit of {}\u{00b0}C and is now {value}\u{00b0}C.",
            self.threshold_c
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_c
    }

    pub fn direction(&self) -> AlertDirection {
        self.direction
    }
}
