//! Data models for the notifier.
//!
//! This module contains the per-user record that both sources are
//! decoded into, plus the outcome and summary types produced by a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One user's activity, keyed by email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Natural key. Kept exactly as the source returned it.
    pub email: String,
    /// Display name (only the graph store supplies one).
    pub full_name: String,
    /// Inbound friend requests, from the graph store.
    pub request_count: u32,
    /// Unseen chat notifications, from the key-value store.
    pub seen_count: u32,
}

impl UserRecord {
    /// A record as produced by the graph store.
    pub fn from_graph(email: impl Into<String>, full_name: impl Into<String>, request_count: u32) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            request_count,
            seen_count: 0,
        }
    }

    /// Whether the record carries a display name.
    pub fn has_display_name(&self) -> bool {
        !self.full_name.trim().is_empty()
    }
}

/// Terminal state of one recipient in the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Notifier accepted the message.
    Sent,
    /// Notifier returned an error on the final attempt.
    Failed,
    /// Never attempted because the run was cancelled.
    Skipped,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryState::Sent => write!(f, "Sent"),
            DeliveryState::Failed => write!(f, "Failed"),
            DeliveryState::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Outcome of delivering to a single recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub email: String,
    pub state: DeliveryState,
    /// Number of send attempts made (0 when skipped).
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts produced by one pass of the dispatch loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Recipients for which at least one send was issued.
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchSummary {
    /// Record an outcome and bump the matching counter.
    pub fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome.state {
            DeliveryState::Sent => self.sent += 1,
            DeliveryState::Failed => self.failed += 1,
            DeliveryState::Skipped => self.skipped += 1,
        }
        if outcome.attempts > 0 {
            self.attempted += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Outcome for a given recipient, if one was recorded.
    #[cfg(test)]
    pub fn outcome_for(&self, email: &str) -> Option<&DeliveryOutcome> {
        self.outcomes.iter().find(|o| o.email == email)
    }
}

/// What the invocation hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub message: String,
}

impl InvocationResponse {
    pub fn successful() -> Self {
        Self {
            message: "successful".to_string(),
        }
    }
}

/// Everything the run report needs about a finished invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub dry_run: bool,
    pub merge: crate::reconcile::MergeStats,
    pub dispatch: DispatchSummary,
}
