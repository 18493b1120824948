//! Logging initialisation and request deadlines.
//!
//! Library code only emits `tracing` events and `metrics` samples; this
//! module wires a subscriber for binaries and tests. Exporter choice
//! (OTLP, Prometheus) is a deployment concern and stays outside the crate.

use crate::{Error, Result};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// A request deadline, propagated to every stage of a request.
///
/// On expiry the in-flight work is abandoned; partial writes are left in
/// place (merges are idempotent, so a retry converges).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// A deadline `ms` milliseconds from now.
    #[must_use]
    pub fn in_millis(ms: u64) -> Self {
        Self {
            expires_at: Instant::now() + Duration::from_millis(ms),
        }
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Fails with [`Error::Timeout`] once the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] naming the abandoned operation.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.expired() {
            Err(Error::Timeout {
                operation: operation.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Initialises the global tracing subscriber once.
///
/// Filtering comes from `YAGOKORO_LOG` (falling back to `RUST_LOG`, then
/// `info`). Safe to call repeatedly; only the first call installs.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("YAGOKORO_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
    }

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::in_millis(0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert!(matches!(
            deadline.check("ingest").unwrap_err(),
            Error::Timeout { .. }
        ));
    }

    #[test]
    fn test_deadline_in_future() {
        let deadline = Deadline::in_millis(60_000);
        assert!(!deadline.expired());
        assert!(deadline.check("ingest").is_ok());
        assert!(deadline.remaining() > Duration::from_secs(50));
    }
}
