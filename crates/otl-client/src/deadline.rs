//! Overall time budget threaded through every blocking call of a run.

use std::{future::Future, time::Duration};

use tokio::time::{Instant, timeout_at};

use crate::error::{OtlError, OtlResult};

/// Stand-in for budgets too large to represent as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts the clock now. Budgets past the clock's range are clamped.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(budget)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { at, budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn timeout_error(&self) -> OtlError {
        OtlError::Timeout {
            budget: self.budget,
        }
    }

    /// Runs `fut` until it finishes or the deadline passes, whichever is first.
    ///
    /// Expiry drops the future, cancelling its in-flight work. An error that
    /// surfaces after expiry is reported as a timeout.
    pub async fn guard<T, F>(&self, fut: F) -> OtlResult<T>
    where
        F: Future<Output = OtlResult<T>>,
    {
        match timeout_at(self.at, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) if self.is_expired() => Err(self.timeout_error()),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(self.timeout_error()),
        }
    }
}
