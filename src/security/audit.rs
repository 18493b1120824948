//! Audit logging for access-control decisions.
//!
//! Keeps a bounded in-process trail of authentication, authorization, and
//! injection events, mirrored to `tracing`. Entries identify actors by key
//! ID, never by key material.

use crate::current_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The action was allowed.
    Success,
    /// The action was rejected by authn/authz.
    Denied,
    /// The input was blocked (injection, validation).
    Blocked,
}

/// A single audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unix timestamp of the event.
    pub timestamp: u64,
    /// Actor identifier (key ID or `anonymous`).
    pub actor: String,
    /// Action name (`authenticate`, `authorize`, `dispatch`, ...).
    pub action: String,
    /// Outcome.
    pub outcome: AuditOutcome,
    /// Free-form detail (permission name, rejection reason).
    pub detail: String,
}

/// Bounded in-memory audit logger.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl AuditLogger {
    /// Creates a logger retaining at most `max_entries` events.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries.min(1024))),
            max_entries: max_entries.max(1),
        }
    }

    /// Records an event.
    pub fn record(&self, actor: &str, action: &str, outcome: AuditOutcome, detail: &str) {
        match outcome {
            AuditOutcome::Success => {
                tracing::debug!(actor, action, detail, "audit: allowed");
            },
            AuditOutcome::Denied => {
                tracing::warn!(actor, action, detail, "audit: denied");
            },
            AuditOutcome::Blocked => {
                tracing::warn!(actor, action, detail, "audit: blocked");
            },
        }
        let entry = AuditEntry {
            timestamp: current_timestamp(),
            actor: actor.to_string(),
            action: action.to_string(),
            outcome,
            detail: detail.to_string(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Returns the most recent `n` entries, newest last.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().rev().take(n).rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Total retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the trail is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let logger = AuditLogger::new(10);
        logger.record("key_1", "authenticate", AuditOutcome::Success, "");
        logger.record("anonymous", "authenticate", AuditOutcome::Denied, "missing");
        let recent = logger.recent(5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].outcome, AuditOutcome::Denied);
    }

    #[test]
    fn test_bounded_retention() {
        let logger = AuditLogger::new(3);
        for i in 0..5 {
            logger.record(&format!("k{i}"), "x", AuditOutcome::Success, "");
        }
        assert_eq!(logger.len(), 3);
        let recent = logger.recent(3);
        assert_eq!(recent[0].actor, "k2");
    }
}
