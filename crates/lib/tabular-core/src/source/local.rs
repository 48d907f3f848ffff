use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DEFAULT_MAX_OBJECT_BYTES, SourceError, SourceStream};

/// Configuration for local file access.
#[derive(Debug, Clone)]
pub struct LocalSourceConfig {
    /// Directory that relative paths resolve against. When set, paths that
    /// escape it are rejected.
    pub root: Option<PathBuf>,
    pub max_bytes: usize,
}

impl LocalSourceConfig {
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for LocalSourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }
}

/// Read-only access to files on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalSource {
    config: LocalSourceConfig,
}

impl LocalSource {
    #[must_use]
    pub const fn new(config: LocalSourceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &LocalSourceConfig {
        &self.config
    }

    /// Opens a regular file read-only.
    ///
    /// # Errors
    /// Returns `NotFound` when the path does not exist or is not a regular file,
    /// `AccessDenied` when permissions or the configured root reject it, and
    /// `TooLarge` when the file exceeds the configured byte limit.
    pub fn open(&self, path: &Path) -> Result<SourceStream, SourceError> {
        if path.as_os_str().is_empty() {
            return Err(SourceError::Invalid("path is required".to_string()));
        }
        let resolved = self.resolve(path)?;
        let location = path.display().to_string();

        let metadata = fs::metadata(&resolved).map_err(|err| map_io_error(&err, &location))?;
        if !metadata.is_file() {
            return Err(SourceError::NotFound(location));
        }
        let actual_bytes = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if actual_bytes > self.config.max_bytes {
            return Err(SourceError::TooLarge {
                location,
                max_bytes: self.config.max_bytes,
                actual_bytes,
            });
        }

        let file = File::open(&resolved).map_err(|err| map_io_error(&err, &location))?;
        debug!(path = %resolved.display(), bytes = actual_bytes, "opened local source");
        Ok(Box::new(file))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, SourceError> {
        let Some(root) = self.config.root.as_ref() else {
            return Ok(path.to_path_buf());
        };
        let location = path.display().to_string();
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let root = root.canonicalize().map_err(|err| {
            SourceError::Unavailable(format!("data directory {}: {err}", root.display()))
        })?;
        let candidate = candidate
            .canonicalize()
            .map_err(|err| map_io_error(&err, &location))?;
        if !candidate.starts_with(&root) {
            return Err(SourceError::AccessDenied(location));
        }
        Ok(candidate)
    }
}

fn map_io_error(err: &io::Error, location: &str) -> SourceError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => {
            SourceError::NotFound(location.to_string())
        }
        ErrorKind::PermissionDenied => SourceError::AccessDenied(location.to_string()),
        _ => SourceError::Backend(format!("{location}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_all(mut stream: SourceStream) -> String {
        let mut text = String::new();
        stream.read_to_string(&mut text).expect("stream should be readable");
        text
    }

    #[test]
    fn opens_regular_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orders.csv");
        fs::write(&path, "id,amount\n1,2\n").expect("write fixture");

        let source = LocalSource::new(LocalSourceConfig::default());
        let stream = source.open(&path).expect("file should open");
        assert_eq!(read_all(stream), "id,amount\n1,2\n");
    }

    #[test]
    fn missing_paths_and_directories_are_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = LocalSource::new(LocalSourceConfig::default());

        let missing = source.open(&dir.path().join("missing.csv")).err();
        assert!(matches!(missing, Some(SourceError::NotFound(_))));

        let directory = source.open(dir.path()).err();
        assert!(matches!(directory, Some(SourceError::NotFound(_))));
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("sample.csv"), "a\n1\n").expect("write fixture");

        let source = LocalSource::new(LocalSourceConfig::default().with_root(dir.path()));
        let stream = source.open(Path::new("sample.csv")).expect("file should open");
        assert_eq!(read_all(stream), "a\n1\n");
    }

    #[test]
    fn paths_escaping_root_are_denied() {
        let outer = tempfile::tempdir().expect("tempdir");
        let root = outer.path().join("data");
        fs::create_dir(&root).expect("create root");
        fs::write(outer.path().join("secret.csv"), "a\n1\n").expect("write fixture");

        let source = LocalSource::new(LocalSourceConfig::default().with_root(&root));
        let err = source.open(Path::new("../secret.csv")).err();
        assert!(matches!(err, Some(SourceError::AccessDenied(_))));
    }

    #[test]
    fn files_over_the_limit_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.csv");
        fs::write(&path, "id\n1\n2\n3\n").expect("write fixture");

        let source = LocalSource::new(LocalSourceConfig::default().with_max_bytes(4));
        let err = source.open(&path).err();
        assert!(matches!(err, Some(SourceError::TooLarge { max_bytes: 4, .. })));
    }
}
