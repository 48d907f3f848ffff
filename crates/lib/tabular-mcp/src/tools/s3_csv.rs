//! Tools reading delimited objects from the object store.

use serde_json::Value;
use tabular_core::control::TabularControlPlane;
use tabular_core::source::DataSourceRef;

use crate::helpers;
use crate::protocol::{ToolArguments, ToolError};
use crate::registry::{ParamSpec, ParamType, ToolDescriptor};

#[must_use]
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "analyze_s3_csv",
            "Summarize a CSV object in S3: row count, column names, and a bounded sample of rows.",
            analyze_s3_csv,
        )
        .with_param(ParamSpec::required("bucket", ParamType::String))
        .with_param(ParamSpec::required("key", ParamType::String)),
    ]
}

fn analyze_s3_csv(control: &TabularControlPlane, args: &ToolArguments) -> Result<Value, ToolError> {
    let bucket = helpers::required_str(args, "bucket")?;
    let key = helpers::required_str(args, "key")?;
    let report = control.analyze(&DataSourceRef::object(bucket, key))?;
    helpers::to_payload(&report)
}
