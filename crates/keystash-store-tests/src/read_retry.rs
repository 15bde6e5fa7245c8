use keystash_spec::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How long to keep re-reading a record that a remote store may not list
/// yet right after it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRetry {
    pub attempts: usize,
    pub delay: Duration,
}

impl Default for ReadRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(100),
        }
    }
}

impl ReadRetry {
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Re-run `read` until it finds something or the attempts run out.
    ///
    /// Transport failures count as "not yet" and are retried; every other
    /// store error ends the wait immediately.
    pub async fn until_found<F, Fut, T>(&self, mut read: F) -> StoreResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<Option<T>>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = read().await;
            let last = attempt >= self.attempts;
            match outcome {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) if last => return Ok(None),
                Err(err @ StoreError::Transport { .. }) if last => return Err(err),
                Ok(None) | Err(StoreError::Transport { .. }) => {
                    debug!(attempt, "record not readable yet");
                }
                Err(err) => return Err(err),
            }
            tokio::time::sleep(self.delay * attempt as u32).await;
            attempt += 1;
        }
    }
}
