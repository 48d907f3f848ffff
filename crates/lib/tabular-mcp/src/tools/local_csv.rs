//! Tools reading delimited files from local storage.

use serde_json::Value;
use tabular_core::control::TabularControlPlane;
use tabular_core::reader::SearchOptions;
use tabular_core::source::DataSourceRef;

use crate::helpers;
use crate::protocol::{ToolArguments, ToolError};
use crate::registry::{ParamSpec, ParamType, ToolDescriptor};

#[must_use]
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "analyze_csv",
            "Summarize a local CSV file: row count, column names, and a bounded sample of rows.",
            analyze_csv,
        )
        .with_param(ParamSpec::required("path", ParamType::String)),
        ToolDescriptor::new(
            "validate_csv_structure",
            "Check a local CSV file against an expected column count and report ragged rows.",
            validate_csv_structure,
        )
        .with_param(ParamSpec::required("path", ParamType::String))
        .with_param(ParamSpec::required("expected_columns", ParamType::Integer))
        .with_param(ParamSpec::optional("strict_mode", ParamType::Boolean)),
        ToolDescriptor::new(
            "search_csv_content",
            "Find rows of a local CSV file where any cell contains a search term.",
            search_csv_content,
        )
        .with_param(ParamSpec::required("path", ParamType::String))
        .with_param(ParamSpec::required("search_term", ParamType::String))
        .with_param(ParamSpec::optional("case_sensitive", ParamType::Boolean)),
    ]
}

fn analyze_csv(control: &TabularControlPlane, args: &ToolArguments) -> Result<Value, ToolError> {
    let path = helpers::required_str(args, "path")?;
    let report = control.analyze(&DataSourceRef::local(path))?;
    helpers::to_payload(&report)
}

fn validate_csv_structure(
    control: &TabularControlPlane,
    args: &ToolArguments,
) -> Result<Value, ToolError> {
    let path = helpers::required_str(args, "path")?;
    let expected_columns = helpers::required_i64(args, "expected_columns")?;
    let strict = helpers::bool_or(args, "strict_mode", false);
    let check = control.validate_structure(&DataSourceRef::local(path), expected_columns, strict)?;
    helpers::to_payload(&check)
}

fn search_csv_content(
    control: &TabularControlPlane,
    args: &ToolArguments,
) -> Result<Value, ToolError> {
    let path = helpers::required_str(args, "path")?;
    let options = SearchOptions::new(helpers::required_str(args, "search_term")?)
        .with_case_sensitive(helpers::bool_or(args, "case_sensitive", false));
    let result = control.search_rows(&DataSourceRef::local(path), &options)?;
    helpers::to_payload(&result)
}
