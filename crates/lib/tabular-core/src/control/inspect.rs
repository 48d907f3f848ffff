use serde::{Deserialize, Serialize};

use crate::reader::{SearchOptions, SearchReport, StructureReport};
use crate::source::DataSourceRef;

use super::{ControlError, TabularControlPlane};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCheck {
    pub source: String,
    #[serde(flatten)]
    pub report: StructureReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: String,
    #[serde(flatten)]
    pub report: SearchReport,
}

impl TabularControlPlane {
    /// Checks a table's width and row shapes.
    ///
    /// # Errors
    /// Returns `ControlError::Invalid` for a negative expected width, and
    /// otherwise any source or parse failure.
    pub fn validate_structure(
        &self,
        source: &DataSourceRef,
        expected_columns: i64,
        strict: bool,
    ) -> Result<StructureCheck, ControlError> {
        let expected_columns = usize::try_from(expected_columns).map_err(|_| {
            ControlError::Invalid(format!(
                "expected_columns must be non-negative, got {expected_columns}"
            ))
        })?;
        let stream = self.sources.open(source)?;
        let report = self
            .reader
            .validate_structure(stream, expected_columns, strict)?;
        Ok(StructureCheck {
            source: source.display_location(),
            report,
        })
    }

    /// Finds rows containing a term in any cell.
    ///
    /// # Errors
    /// Returns `ControlError::Invalid` for an empty term, and otherwise any
    /// source or parse failure.
    pub fn search_rows(
        &self,
        source: &DataSourceRef,
        options: &SearchOptions,
    ) -> Result<SearchResult, ControlError> {
        if options.term.is_empty() {
            return Err(ControlError::Invalid("search_term must not be empty".to_string()));
        }
        let stream = self.sources.open(source)?;
        let report = self.reader.search(stream, options)?;
        Ok(SearchResult {
            source: source.display_location(),
            report,
        })
    }
}
