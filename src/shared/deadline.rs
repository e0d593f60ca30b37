//! Request-scoped deadlines
//!
//! Every engine operation runs under a [`Deadline`]. When it expires the
//! in-flight future is dropped. Whether a write dropped this way landed is
//! unknown to the caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use super::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// No deadline at all.
    pub fn none() -> Self {
        Self(None)
    }

    /// The earlier of two deadlines.
    pub fn min(self, other: Deadline) -> Self {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self(Some(a.min(b))),
            (Some(a), None) | (None, Some(a)) => Self(Some(a)),
            (None, None) => Self(None),
        }
    }

    /// Drive `fut` to completion or fail with [`DomainError::DeadlineExceeded`].
    ///
    /// A write cut off this way may still have been applied: the store can
    /// commit before its reply is polled. Callers re-read instead of retrying.
    pub async fn run<T, F>(self, operation: &'static str, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        let Some(at) = self.0 else {
            return fut.await;
        };

        match tokio::time::timeout_at(at, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, "Deadline exceeded, operation aborted");
                Err(DomainError::DeadlineExceeded(operation))
            }
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
