use std::collections::HashSet;
use std::{error::Error, fmt, io::Read};

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Default number of data rows included in a summary preview.
pub const DEFAULT_SAMPLE_CAP: usize = 50;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A data row keyed by column name, in file column order.
pub type Row = Map<String, Value>;

/// Options for parsing delimited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Maximum number of rows returned in previews.
    pub sample_cap: usize,
    /// Reject rows whose field count differs from the header.
    pub strict: bool,
    pub delimiter: u8,
}

impl ReaderOptions {
    #[must_use]
    pub const fn with_sample_cap(mut self, sample_cap: usize) -> Self {
        self.sample_cap = sample_cap;
        self
    }

    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
            strict: true,
            delimiter: b',',
        }
    }
}

/// Row count, header, and a bounded preview of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub sample_rows: Vec<Row>,
    pub truncated: bool,
}

/// Why a body could not be read as a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// No bytes, or only whitespace.
    EmptyInput,
    /// The first line carries no column names.
    EmptyHeader,
    /// A header field is blank; `position` is 1-based.
    BlankColumnName { position: usize },
    DuplicateColumn(String),
    /// A data row's field count differs from the header in strict mode.
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    /// The text cannot be tokenized, e.g. it is not UTF-8.
    Malformed(String),
    /// The underlying stream failed.
    Io(String),
}

impl ReadError {
    /// Returns true when the content itself is not valid tabular text.
    #[must_use]
    pub const fn is_malformed_content(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "input is empty"),
            Self::EmptyHeader => write!(f, "header row is empty"),
            Self::BlankColumnName { position } => {
                write!(f, "header column {position} has an empty name")
            }
            Self::DuplicateColumn(name) => write!(f, "duplicate column name: {name}"),
            Self::RaggedRow {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {line} has {found} fields, header has {expected}"
            ),
            Self::Malformed(message) => write!(f, "malformed delimited text: {message}"),
            Self::Io(message) => write!(f, "read failed: {message}"),
        }
    }
}

impl Error for ReadError {}

impl From<csv::Error> for ReadError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            Self::Io(err.to_string())
        } else {
            Self::Malformed(err.to_string())
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Parsed header plus a record reader positioned on the first data row.
pub(crate) struct Table<'a> {
    pub(crate) columns: Vec<String>,
    records: csv::Reader<&'a [u8]>,
    strict: bool,
}

impl Table<'_> {
    /// Reads the next data record, enforcing the field count in strict mode.
    pub(crate) fn next_record(
        &mut self,
        record: &mut StringRecord,
    ) -> Result<bool, ReadError> {
        if !self.records.read_record(record)? {
            return Ok(false);
        }
        if self.strict && record.len() != self.columns.len() {
            return Err(ReadError::RaggedRow {
                line: record_line(record),
                expected: self.columns.len(),
                found: record.len(),
            });
        }
        Ok(true)
    }

    /// Converts a record to a row keyed by column name.
    ///
    /// Missing trailing cells become `null`; surplus cells are dropped.
    pub(crate) fn to_row(&self, record: &StringRecord) -> Row {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let value = record.get(index).map_or(Value::Null, cell_value);
                (column.clone(), value)
            })
            .collect()
    }
}

pub(crate) fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

/// Parses and summarizes delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularReader {
    options: ReaderOptions,
}

impl TabularReader {
    #[must_use]
    pub const fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Summarizes a stream: total data rows, header, and the first
    /// `sample_cap` rows.
    ///
    /// # Errors
    /// Returns `ReadError` when the input is empty, the header is empty or has
    /// duplicate names, a row is malformed, or the stream cannot be read.
    pub fn summarize(&self, stream: impl Read) -> Result<TableSummary, ReadError> {
        let bytes = read_all(stream)?;
        let mut table = self.open(&bytes, self.options.strict)?;

        let mut row_count = 0usize;
        let mut sample_rows = Vec::with_capacity(self.options.sample_cap.min(256));
        let mut record = StringRecord::new();
        while table.next_record(&mut record)? {
            if sample_rows.len() < self.options.sample_cap {
                sample_rows.push(table.to_row(&record));
            }
            row_count += 1;
        }

        Ok(TableSummary {
            row_count,
            truncated: row_count > sample_rows.len(),
            columns: table.columns,
            sample_rows,
        })
    }

    pub(crate) fn open<'a>(&self, bytes: &'a [u8], strict: bool) -> Result<Table<'a>, ReadError> {
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ReadError::EmptyInput);
        }
        // The csv reader skips blank lines, so a blank header line has to be
        // caught before it silently promotes the first data row. A lone `\r`
        // ends a line for the csv reader too.
        let first_line = body
            .split(|byte| matches!(*byte, b'\n' | b'\r'))
            .next()
            .unwrap_or_default();
        if first_line.iter().all(u8::is_ascii_whitespace) {
            return Err(ReadError::EmptyHeader);
        }

        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.options.delimiter)
            .from_reader(body);
        let mut header = StringRecord::new();
        if !records.read_record(&mut header)? {
            return Err(ReadError::EmptyInput);
        }
        let columns = header_columns(&header)?;

        Ok(Table {
            columns,
            records,
            strict,
        })
    }
}

/// Summarizes a stream with default options and the given sample cap.
///
/// # Errors
/// See [`TabularReader::summarize`].
pub fn summarize(stream: impl Read, sample_cap: usize) -> Result<TableSummary, ReadError> {
    TabularReader::new(ReaderOptions::default().with_sample_cap(sample_cap)).summarize(stream)
}

pub(crate) fn read_all(mut stream: impl Read) -> Result<Vec<u8>, ReadError> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn header_columns(header: &StringRecord) -> Result<Vec<String>, ReadError> {
    if header.iter().all(|name| name.trim().is_empty()) {
        return Err(ReadError::EmptyHeader);
    }
    let mut seen = HashSet::with_capacity(header.len());
    let mut columns = Vec::with_capacity(header.len());
    for (index, name) in header.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ReadError::BlankColumnName { position: index + 1 });
        }
        if !seen.insert(name) {
            return Err(ReadError::DuplicateColumn(name.to_string()));
        }
        columns.push(name.to_string());
    }
    Ok(columns)
}

/// Converts a cell to JSON: a number when the text is unambiguously numeric,
/// otherwise the text unchanged.
///
/// Integers with leading zeros, explicit `+` signs, `inf`/`NaN`, and integers
/// outside the `i64` range stay text.
#[must_use]
pub fn cell_value(raw: &str) -> Value {
    if is_plain_integer(raw) {
        if let Ok(value) = raw.parse::<i64>() {
            return Value::from(value);
        }
    } else if is_plain_decimal(raw)
        && let Ok(value) = raw.parse::<f64>()
        && let Some(number) = Number::from_f64(value)
    {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

fn is_integer_part(text: &str) -> bool {
    is_digits(text) && (text == "0" || !text.starts_with('0'))
}

/// `-0` is excluded: as an integer it would lose its sign.
fn is_plain_integer(raw: &str) -> bool {
    raw != "-0" && is_integer_part(raw.strip_prefix('-').unwrap_or(raw))
}

fn is_plain_decimal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(index) => (&unsigned[..index], Some(&unsigned[index + 1..])),
        None => (unsigned, None),
    };
    if let Some(exponent) = exponent {
        let digits = exponent
            .strip_prefix(['+', '-'])
            .unwrap_or(exponent);
        if !is_digits(digits) {
            return false;
        }
    }
    match mantissa.split_once('.') {
        Some((whole, fraction)) => is_integer_part(whole) && is_digits(fraction),
        None => exponent.is_some() && is_integer_part(mantissa),
    }
}
