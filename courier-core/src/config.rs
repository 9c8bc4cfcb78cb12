//! Tunable windows for the freshness checker.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time windows governing query de-duplication and response throttling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Minimum interval between two outbound queries of the same kind
    /// for the same entity.
    pub query_expiry: Duration,
    /// Minimum interval between two accepted responses (and between
    /// two visa pushes to the same receiver).
    pub respond_expiry: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            // each query expires after 10 minutes
            query_expiry: Duration::from_secs(600),
            // each respond expires after 10 minutes
            respond_expiry: Duration::from_secs(600),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query-expiry window.
    pub fn with_query_expiry(mut self, window: Duration) -> Self {
        self.query_expiry = window;
        self
    }

    /// Set the respond-expiry window.
    pub fn with_respond_expiry(mut self, window: Duration) -> Self {
        self.respond_expiry = window;
        self
    }

    /// Both windows must be non-zero; a zero window would turn the
    /// de-duplication gate into a pass-through.
    pub fn is_valid(&self) -> bool {
        !self.query_expiry.is_zero() && !self.respond_expiry.is_zero()
    }
}
