use std::sync::Arc;

use tabular_core::control::TabularControlPlane;
use tabular_core::reader::ReaderOptions;
use tabular_core::source::{
    DataSources,
    LazyS3ObjectStore,
    LocalSource,
    LocalSourceConfig,
    ObjectStoreSource,
    RetryPolicy,
    S3ObjectStoreConfig,
};

use crate::config::TabularConfig;

/// Wires local and object-store access from the resolved configuration.
///
/// The S3 client is created once, on the first object-store read, and shared
/// by every invocation afterwards.
pub fn build_control_plane(config: &TabularConfig) -> TabularControlPlane {
    let mut local = LocalSourceConfig::default().with_max_bytes(config.max_object_bytes);
    if let Some(root) = &config.data_dir {
        local = local.with_root(root.clone());
    }

    let mut s3 = S3ObjectStoreConfig::default().with_force_path_style(config.s3_force_path_style);
    if let Some(region) = &config.s3_region {
        s3 = s3.with_region(region.clone());
    }
    if let Some(endpoint) = &config.s3_endpoint {
        s3 = s3.with_endpoint(endpoint.clone());
    }

    let mut object_store = ObjectStoreSource::new(Arc::new(LazyS3ObjectStore::new(s3)))
        .with_retry(RetryPolicy::new(config.fetch_attempts, config.fetch_backoff))
        .with_max_bytes(config.max_object_bytes);
    if let Some(buckets) = &config.allowed_buckets {
        object_store = object_store.with_allowed_buckets(buckets.iter().cloned());
    }

    let sources = DataSources::new(LocalSource::new(local)).with_object_store(object_store);
    TabularControlPlane::new(
        sources,
        ReaderOptions::default().with_sample_cap(config.sample_cap),
    )
}
