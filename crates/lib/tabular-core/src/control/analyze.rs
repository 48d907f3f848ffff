use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reader::TableSummary;
use crate::source::DataSourceRef;

use super::{ControlError, TabularControlPlane};

/// Summary of one table, tagged with where it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub source: String,
    pub column_count: usize,
    #[serde(flatten)]
    pub summary: TableSummary,
}

impl TabularControlPlane {
    /// Opens a source and summarizes it with the configured sample cap.
    ///
    /// # Errors
    /// Returns `ControlError` if the source cannot be opened or parsed.
    pub fn analyze(&self, source: &DataSourceRef) -> Result<AnalysisReport, ControlError> {
        let stream = self.sources.open(source)?;
        let summary = self.reader.summarize(stream)?;
        debug!(
            source = %source,
            rows = summary.row_count,
            columns = summary.columns.len(),
            "summarized table"
        );
        Ok(AnalysisReport {
            source: source.display_location(),
            column_count: summary.columns.len(),
            summary,
        })
    }
}
