//! Deadlines for blocking steps
//!
//! Every network request, subprocess and process-table scan takes a
//! [`Deadline`] so a hung server or script cannot stall an invocation.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::Instant;

/// Fallback horizon when a budget would overflow the clock
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// An absolute point in time after which a step is abandoned
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(budget)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { at, budget }
    }

    /// The budget this deadline was created with
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Drive `future` until it completes or the deadline passes
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout_at(self.at, future).await
    }
}
