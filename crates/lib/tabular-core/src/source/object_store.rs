use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{DEFAULT_MAX_OBJECT_BYTES, SourceError, SourceStream};

/// Minimal blocking object-store client.
///
/// Implementations perform a single fetch per call and classify failures;
/// retrying is left to [`ObjectStoreSource`].
pub trait ObjectStoreClient: Send + Sync {
    /// Reads a whole object, failing with `TooLarge` past `max_bytes`.
    ///
    /// # Errors
    /// Returns a classified `SourceError` for missing objects, rejected
    /// credentials, transient service failures, or oversized objects.
    fn get_object(&self, bucket: &str, key: &str, max_bytes: usize)
    -> Result<Vec<u8>, SourceError>;
}

/// Bounded retry with exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the attempt following `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Object-store reads scoped by bucket policy, size limit, and retry policy.
#[derive(Clone)]
pub struct ObjectStoreSource {
    client: Arc<dyn ObjectStoreClient>,
    retry: RetryPolicy,
    max_bytes: usize,
    allowed_buckets: Option<BTreeSet<String>>,
}

impl ObjectStoreSource {
    #[must_use]
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            max_bytes: DEFAULT_MAX_OBJECT_BYTES,
            allowed_buckets: None,
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Restricts reads to the given buckets. An empty set allows nothing.
    #[must_use]
    pub fn with_allowed_buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_buckets = Some(buckets.into_iter().map(Into::into).collect());
        self
    }

    /// Fetches an object, retrying transient failures up to the policy bound.
    ///
    /// # Errors
    /// Returns `Invalid` for empty bucket or key, `AccessDenied` for buckets
    /// outside the allowed scope, and otherwise the last fetch error.
    pub fn open(&self, bucket: &str, key: &str) -> Result<SourceStream, SourceError> {
        let bytes = self.fetch(bucket, key)?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, SourceError> {
        if bucket.trim().is_empty() {
            return Err(SourceError::Invalid("bucket is required".to_string()));
        }
        if key.trim().is_empty() {
            return Err(SourceError::Invalid("key is required".to_string()));
        }
        if let Some(allowed) = &self.allowed_buckets
            && !allowed.contains(bucket)
        {
            return Err(SourceError::AccessDenied(format!("s3://{bucket}/{key}")));
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.get_object(bucket, key, self.max_bytes) {
                Ok(bytes) => {
                    debug!(bucket, key, attempt, bytes = bytes.len(), "fetched object");
                    return Ok(bytes);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        bucket,
                        key,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient object fetch failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
