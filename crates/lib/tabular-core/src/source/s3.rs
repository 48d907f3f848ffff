//! S3-backed object-store client.
//!
//! Fetches are issued from synchronous handler code. When the calling thread
//! already sits inside a Tokio runtime the fetch blocks on that runtime, via
//! `block_in_place` on a multi-thread runtime or a helper thread otherwise.
//! The client's own runtime drives fetches only from threads outside any
//! runtime. SDK-level retries are disabled; [`super::ObjectStoreSource`]
//! applies the only retry loop.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use tokio::io::AsyncReadExt;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::info;

use super::{ObjectStoreClient, SourceError};

const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NoSuchBucket", "NotFound"];
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AllAccessDisabled",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];
const TRANSIENT_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestTimeout",
    "RequestTimeTooSkewed",
    "InternalError",
    "ServiceUnavailable",
];

/// Connection settings for the S3 client.
#[derive(Debug, Clone, Default)]
pub struct S3ObjectStoreConfig {
    /// AWS region; falls back to the environment's default chain.
    pub region: Option<String>,
    /// Custom endpoint URL for S3-compatible stores.
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

impl S3ObjectStoreConfig {
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub const fn with_force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }
}

/// Blocks on an object-store future.
///
/// Prefers the caller's current runtime; `runtime` is the fallback for
/// threads outside any runtime.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| SourceError::Unavailable(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx.recv().unwrap_or_else(|_| {
            Err(SourceError::Unavailable("object store thread join failed".to_string()))
        });
    }

    runtime.block_on(future)
}

/// S3 client shared by every invocation in the process.
pub struct S3ObjectStore {
    client: Client,
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3ObjectStore {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3ObjectStore {
    /// Loads AWS configuration and builds the client.
    ///
    /// # Errors
    /// Returns `Unavailable` when the runtime cannot be created.
    pub fn connect(config: &S3ObjectStoreConfig) -> Result<Self, SourceError> {
        let runtime = Runtime::new().map_err(|err| SourceError::Unavailable(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let shared_config = block_on_with_runtime(&runtime, async move {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            Ok(loader.load().await)
        })?;
        let mut s3_builder =
            aws_sdk_s3::config::Builder::from(&shared_config).retry_config(RetryConfig::disabled());
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        info!(
            region = config.region.as_deref().unwrap_or("default"),
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "object store client initialized"
        );
        Ok(Self {
            client,
            runtime: Some(Arc::new(runtime)),
        })
    }

    fn runtime(&self) -> Result<&Runtime, SourceError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| SourceError::Unavailable("object store runtime closed".to_string()))
    }
}

impl ObjectStoreClient for S3ObjectStore {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        max_bytes: usize,
    ) -> Result<Vec<u8>, SourceError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        block_on_with_runtime(self.runtime()?, async move {
            let location = format!("s3://{bucket}/{key}");
            let output = client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| classify_get_error(&err, &location))?;
            if let Some(length) = output.content_length() {
                let actual_bytes = usize::try_from(length).unwrap_or(usize::MAX);
                if actual_bytes > max_bytes {
                    return Err(SourceError::TooLarge {
                        location,
                        max_bytes,
                        actual_bytes,
                    });
                }
            }
            let mut reader = output.body.into_async_read();
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let read = reader
                    .read(&mut chunk)
                    .await
                    .map_err(|err| SourceError::Transient(format!("{location}: {err}")))?;
                if read == 0 {
                    break;
                }
                if buffer.len() + read > max_bytes {
                    return Err(SourceError::TooLarge {
                        location,
                        max_bytes,
                        actual_bytes: buffer.len() + read,
                    });
                }
                buffer.extend_from_slice(&chunk[..read]);
            }
            Ok(buffer)
        })
    }
}

fn classify_get_error(err: &SdkError<GetObjectError>, location: &str) -> SourceError {
    match err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            if inner.is_no_such_key() {
                return SourceError::NotFound(location.to_string());
            }
            let status = service.raw().status().as_u16();
            classify_service_code(inner.code(), Some(status), location, &inner.to_string())
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            SourceError::Transient(format!("{location}: {err}"))
        }
        _ => SourceError::Backend(format!("{location}: {err}")),
    }
}

/// Maps an error code and optional HTTP status onto a source error.
pub(crate) fn classify_service_code(
    code: Option<&str>,
    status: Option<u16>,
    location: &str,
    detail: &str,
) -> SourceError {
    if let Some(code) = code {
        if NOT_FOUND_CODES.contains(&code) {
            return SourceError::NotFound(location.to_string());
        }
        if ACCESS_DENIED_CODES.contains(&code) {
            return SourceError::AccessDenied(location.to_string());
        }
        if TRANSIENT_CODES.contains(&code) {
            return SourceError::Transient(format!("{location}: {code}"));
        }
    }
    match status {
        Some(404) => SourceError::NotFound(location.to_string()),
        Some(401 | 403) => SourceError::AccessDenied(location.to_string()),
        Some(408 | 429 | 500..=599) => SourceError::Transient(format!("{location}: {detail}")),
        _ => SourceError::Backend(format!("{location}: {detail}")),
    }
}

/// Lazily connected S3 client.
///
/// The first object-store read builds the client; later reads reuse it.
pub struct LazyS3ObjectStore {
    config: S3ObjectStoreConfig,
    store: OnceLock<Result<S3ObjectStore, SourceError>>,
}

impl LazyS3ObjectStore {
    #[must_use]
    pub const fn new(config: S3ObjectStoreConfig) -> Self {
        Self {
            config,
            store: OnceLock::new(),
        }
    }

    fn store(&self) -> Result<&S3ObjectStore, SourceError> {
        self.store
            .get_or_init(|| S3ObjectStore::connect(&self.config))
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl ObjectStoreClient for LazyS3ObjectStore {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        max_bytes: usize,
    ) -> Result<Vec<u8>, SourceError> {
        self.store()?.get_object(bucket, key, max_bytes)
    }
}
