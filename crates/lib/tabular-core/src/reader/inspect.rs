use std::io::Read;

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use super::delimited::{ReadError, Row, TabularReader, read_all, record_line};

/// A data row whose field count differs from the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaggedRow {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub field_count: usize,
}

/// Header and row-shape check of a table against an expected width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    pub columns: Vec<String>,
    pub column_count: usize,
    pub expected_columns: usize,
    pub matches_expected: bool,
    pub row_count: usize,
    pub ragged_rows: Vec<RaggedRow>,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub term: String,
    pub case_sensitive: bool,
}

impl SearchOptions {
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            case_sensitive: false,
        }
    }

    #[must_use]
    pub const fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    fn matcher(&self) -> impl Fn(&str) -> bool + '_ {
        let folded = if self.case_sensitive {
            self.term.clone()
        } else {
            self.term.to_lowercase()
        };
        move |cell: &str| {
            if self.case_sensitive {
                cell.contains(folded.as_str())
            } else {
                cell.to_lowercase().contains(folded.as_str())
            }
        }
    }
}

/// Rows containing a search term in any cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchReport {
    pub columns: Vec<String>,
    pub search_term: String,
    pub matched_rows: usize,
    pub rows: Vec<Row>,
    pub truncated: bool,
}

impl TabularReader {
    /// Checks the header width against `expected_columns` and records rows
    /// whose field count differs from the header.
    ///
    /// With `strict` set, the first ragged row fails the check instead of
    /// being reported. Reported ragged rows are capped at the sample cap.
    ///
    /// # Errors
    /// Returns `ReadError` for unreadable or malformed input, and for a
    /// ragged row in strict mode.
    pub fn validate_structure(
        &self,
        stream: impl Read,
        expected_columns: usize,
        strict: bool,
    ) -> Result<StructureReport, ReadError> {
        let bytes = read_all(stream)?;
        let mut table = self.open(&bytes, strict)?;
        let width = table.columns.len();

        let mut row_count = 0usize;
        let mut ragged_count = 0usize;
        let mut ragged_rows = Vec::new();
        let mut record = StringRecord::new();
        while table.next_record(&mut record)? {
            row_count += 1;
            if record.len() != width {
                ragged_count += 1;
                if ragged_rows.len() < self.options().sample_cap {
                    ragged_rows.push(RaggedRow {
                        row: row_count,
                        field_count: record.len(),
                    });
                }
                tracing::debug!(line = record_line(&record), fields = record.len(), "ragged row");
            }
        }

        let matches_expected = width == expected_columns;
        Ok(StructureReport {
            column_count: width,
            columns: table.columns,
            expected_columns,
            matches_expected,
            row_count,
            ragged_rows,
            valid: matches_expected && ragged_count == 0,
        })
    }

    /// Collects rows where any cell contains the search term.
    ///
    /// # Errors
    /// Returns `ReadError` for unreadable or malformed input.
    pub fn search(
        &self,
        stream: impl Read,
        options: &SearchOptions,
    ) -> Result<SearchReport, ReadError> {
        let bytes = read_all(stream)?;
        let mut table = self.open(&bytes, self.options().strict)?;
        let matches = options.matcher();

        let mut matched_rows = 0usize;
        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        while table.next_record(&mut record)? {
            if !record.iter().any(&matches) {
                continue;
            }
            matched_rows += 1;
            if rows.len() < self.options().sample_cap {
                rows.push(table.to_row(&record));
            }
        }

        Ok(SearchReport {
            truncated: matched_rows > rows.len(),
            columns: table.columns,
            search_term: options.term.clone(),
            matched_rows,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ReaderOptions;
    use serde_json::json;

    const PEOPLE: &str = "name,city,age\nAda,London,36\nalan,Wilmslow,41\nGrace,New York,85\n";

    #[test]
    fn reports_ragged_rows_when_lenient() {
        let reader = TabularReader::default();
        let report = reader
            .validate_structure("a,b,c\n1,2,3\n4,5\n6,7,8,9\n".as_bytes(), 3, false)
            .unwrap();

        assert_eq!(report.column_count, 3);
        assert!(report.matches_expected);
        assert_eq!(report.row_count, 3);
        assert_eq!(
            report.ragged_rows,
            vec![
                RaggedRow {
                    row: 2,
                    field_count: 2
                },
                RaggedRow {
                    row: 3,
                    field_count: 4
                },
            ]
        );
        assert!(!report.valid);
    }

    #[test]
    fn strict_validation_fails_on_ragged_rows() {
        let reader = TabularReader::default();
        let err = reader
            .validate_structure("a,b\n1,2\n3\n".as_bytes(), 2, true)
            .unwrap_err();
        assert!(matches!(err, ReadError::RaggedRow { found: 1, .. }));
    }

    #[test]
    fn width_mismatch_is_invalid() {
        let reader = TabularReader::default();
        let report = reader
            .validate_structure("a,b\n1,2\n".as_bytes(), 3, false)
            .unwrap();
        assert!(!report.matches_expected);
        assert!(!report.valid);
        assert!(report.ragged_rows.is_empty());
    }

    #[test]
    fn search_ignores_case_by_default() {
        let reader = TabularReader::default();
        let report = reader
            .search(PEOPLE.as_bytes(), &SearchOptions::new("AL"))
            .unwrap();
        assert_eq!(report.matched_rows, 1);
        assert_eq!(report.rows[0]["name"], json!("alan"));
        assert_eq!(report.rows[0]["age"], json!(41));
        assert!(!report.truncated);
    }

    #[test]
    fn case_sensitive_search_is_exact() {
        let reader = TabularReader::default();
        let options = SearchOptions::new("AL").with_case_sensitive(true);
        let report = reader.search(PEOPLE.as_bytes(), &options).unwrap();
        assert_eq!(report.matched_rows, 0);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn search_results_are_capped() {
        let reader = TabularReader::new(ReaderOptions::default().with_sample_cap(1));
        let report = reader
            .search(PEOPLE.as_bytes(), &SearchOptions::new("o"))
            .unwrap();
        assert_eq!(report.matched_rows, 3);
        assert_eq!(report.rows.len(), 1);
        assert!(report.truncated);
    }
}
