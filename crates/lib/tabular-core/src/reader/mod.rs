//! Readers for delimited tabular text.
//!
//! Each reader consumes a byte stream and produces a bounded, serializable view
//! of the table: summaries, structure checks, and row searches.

pub mod delimited;
pub mod inspect;

pub use delimited::{
    DEFAULT_SAMPLE_CAP,
    ReadError,
    ReaderOptions,
    Row,
    TableSummary,
    TabularReader,
    cell_value,
    summarize,
};
pub use inspect::{RaggedRow, SearchOptions, SearchReport, StructureReport};
