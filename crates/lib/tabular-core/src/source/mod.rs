//! Data source adapters.
//!
//! A [`DataSourceRef`] names either a local file or an object-store key. The
//! [`DataSources`] facade resolves it to exactly one readable byte stream, or
//! fails with a classified [`SourceError`] before any parsing happens.

pub mod local;
pub mod object_store;
pub mod s3;

use std::{error::Error, fmt, io::Read, path::PathBuf, sync::Arc};

pub use local::{LocalSource, LocalSourceConfig};
pub use object_store::{ObjectStoreClient, ObjectStoreSource, RetryPolicy};
pub use s3::{LazyS3ObjectStore, S3ObjectStore, S3ObjectStoreConfig};

/// Default upper bound on bytes read from a single source.
pub const DEFAULT_MAX_OBJECT_BYTES: usize = 64 * 1024 * 1024;

/// Readable byte stream produced by a source adapter.
pub type SourceStream = Box<dyn Read + Send>;

/// Reference to a table-like file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceRef {
    /// A file on local storage, relative paths resolving against the data dir.
    Local { path: PathBuf },
    /// An object addressed by bucket and key.
    ObjectStore { bucket: String, key: String },
}

impl DataSourceRef {
    #[must_use]
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    #[must_use]
    pub fn object(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ObjectStore {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Human-readable location, `s3://bucket/key` for object-store references.
    #[must_use]
    pub fn display_location(&self) -> String {
        match self {
            Self::Local { path } => path.display().to_string(),
            Self::ObjectStore { bucket, key } => format!("s3://{bucket}/{key}"),
        }
    }
}

impl fmt::Display for DataSourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_location())
    }
}

/// Failure resolving a source to bytes.
///
/// Only `Transient` is retried; every other variant is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The path or object does not exist, or is not a regular file.
    NotFound(String),
    /// Credentials, bucket policy, or the configured scope rejected the read.
    AccessDenied(String),
    /// Network or service-side failure that may clear on retry.
    Transient(String),
    /// The reference itself is unusable, e.g. an empty bucket or key.
    Invalid(String),
    /// The source exceeds the configured byte limit.
    TooLarge {
        location: String,
        max_bytes: usize,
        actual_bytes: usize,
    },
    /// The backend could not be set up, or is not configured.
    Unavailable(String),
    /// Any other backend failure.
    Backend(String),
}

impl SourceError {
    /// Returns true when a retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(location) => write!(f, "source not found: {location}"),
            Self::AccessDenied(location) => write!(f, "access denied: {location}"),
            Self::Transient(message) => write!(f, "transient source failure: {message}"),
            Self::Invalid(message) => write!(f, "invalid source reference: {message}"),
            Self::TooLarge {
                location,
                max_bytes,
                actual_bytes,
            } => write!(
                f,
                "source too large: {location} ({actual_bytes} > {max_bytes} bytes)"
            ),
            Self::Unavailable(message) => write!(f, "source unavailable: {message}"),
            Self::Backend(message) => write!(f, "source backend error: {message}"),
        }
    }
}

impl Error for SourceError {}

/// Uniform read access over local files and object-store keys.
#[derive(Clone)]
pub struct DataSources {
    local: LocalSource,
    object_store: Option<ObjectStoreSource>,
}

impl DataSources {
    #[must_use]
    pub const fn new(local: LocalSource) -> Self {
        Self {
            local,
            object_store: None,
        }
    }

    #[must_use]
    pub fn with_object_store(mut self, object_store: ObjectStoreSource) -> Self {
        self.object_store = Some(object_store);
        self
    }

    /// Convenience for wiring a bare client with the default retry policy.
    #[must_use]
    pub fn with_object_client(self, client: Arc<dyn ObjectStoreClient>) -> Self {
        let max_bytes = self.local.config().max_bytes;
        self.with_object_store(ObjectStoreSource::new(client).with_max_bytes(max_bytes))
    }

    #[must_use]
    pub const fn local(&self) -> &LocalSource {
        &self.local
    }

    /// Resolves a reference to a readable byte stream.
    ///
    /// # Errors
    /// Returns `SourceError` when the source is missing, unreadable, too large,
    /// or the object store stays unavailable after bounded retries.
    pub fn open(&self, source: &DataSourceRef) -> Result<SourceStream, SourceError> {
        match source {
            DataSourceRef::Local { path } => self.local.open(path),
            DataSourceRef::ObjectStore { bucket, key } => {
                let store = self.object_store.as_ref().ok_or_else(|| {
                    SourceError::Unavailable("object store is not configured".to_string())
                })?;
                store.open(bucket, key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_refs_display_as_s3_uris() {
        let source = DataSourceRef::object("bucket-x", "data/orders.csv");
        assert_eq!(source.to_string(), "s3://bucket-x/data/orders.csv");
    }

    #[test]
    fn object_refs_fail_without_a_configured_store() {
        let sources = DataSources::new(LocalSource::new(LocalSourceConfig::default()));
        let err = sources
            .open(&DataSourceRef::object("bucket-x", "orders.csv"))
            .err()
            .expect("object store should be missing");
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
