use std::{error::Error, fmt};

use crate::reader::{ReadError, ReaderOptions, TabularReader};
use crate::source::{DataSources, SourceError};

pub mod analyze;
pub mod inspect;

pub use analyze::AnalysisReport;
pub use inspect::{SearchResult, StructureCheck};

/// Failure of a control-plane operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    Source(SourceError),
    Read(ReadError),
    /// An argument is out of range for the operation.
    Invalid(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            Self::Read(err) => write!(f, "{err}"),
            Self::Invalid(message) => write!(f, "invalid request: {message}"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Read(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<SourceError> for ControlError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<ReadError> for ControlError {
    fn from(err: ReadError) -> Self {
        Self::Read(err)
    }
}

/// Read-only analysis operations over configured data sources.
///
/// Cloning is cheap; the object-store client is shared between clones.
#[derive(Clone)]
pub struct TabularControlPlane {
    sources: DataSources,
    reader: TabularReader,
}

impl TabularControlPlane {
    #[must_use]
    pub const fn new(sources: DataSources, options: ReaderOptions) -> Self {
        Self {
            sources,
            reader: TabularReader::new(options),
        }
    }

    #[must_use]
    pub const fn sources(&self) -> &DataSources {
        &self.sources
    }

    #[must_use]
    pub const fn reader(&self) -> &TabularReader {
        &self.reader
    }
}
