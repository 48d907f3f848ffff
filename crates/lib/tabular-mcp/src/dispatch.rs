//! Single entry point for tool invocations.
//!
//! The dispatcher resolves the tool, validates arguments against its schema,
//! runs the handler, and folds every outcome into a [`ToolResult`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tabular_core::control::TabularControlPlane;
use tracing::{error, info, warn};

use crate::protocol::{ErrorKind, ToolArguments, ToolError, ToolRequest, ToolResult};
use crate::registry::{ParamSpec, ToolDescriptor, ToolRegistry};

/// Routes requests to registered tools.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    control: TabularControlPlane,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>, control: TabularControlPlane) -> Self {
        Self { registry, control }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn control(&self) -> &TabularControlPlane {
        &self.control
    }

    /// Runs one request to completion.
    ///
    /// Unknown tools and invalid arguments fail before the handler runs.
    /// Handler errors keep their kind, except that execution failures and
    /// panics are reported with a generic message and logged in full.
    #[must_use]
    pub fn dispatch(&self, request: &ToolRequest) -> ToolResult {
        let started = Instant::now();
        let tool = request.tool_name.as_str();
        info!(tool, "tool invocation started");

        let Ok(descriptor) = self.registry.lookup(tool) else {
            warn!(tool, "unknown tool requested");
            return ToolResult::failure(ErrorKind::UnknownTool, format!("unknown tool: {tool}"));
        };

        let arguments = match validate_arguments(&descriptor.parameters, &request.arguments) {
            Ok(arguments) => arguments,
            Err(message) => {
                warn!(tool, reason = %message, "rejected tool arguments");
                return ToolResult::failure(ErrorKind::InvalidArguments, message);
            }
        };

        let result = match self.invoke(descriptor, &arguments) {
            Ok(payload) => ToolResult::success(payload),
            Err(err) if err.kind == ErrorKind::ExecutionError => {
                error!(tool, cause = %err.message, "tool execution failed");
                ToolResult::failure(
                    ErrorKind::ExecutionError,
                    format!("tool '{tool}' failed to execute"),
                )
            }
            Err(err) => ToolResult::failure(err.kind, err.message),
        };

        info!(
            tool,
            status = result.error_kind().map_or("ok", ErrorKind::as_str),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "tool invocation finished"
        );
        result
    }

    /// Runs [`Self::dispatch`] on the blocking pool.
    ///
    /// A task that fails to complete is reported as `InternalError`.
    #[must_use]
    pub async fn dispatch_blocking(&self, request: ToolRequest) -> ToolResult {
        let dispatcher = self.clone();
        let tool = request.tool_name.clone();
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(&request)).await {
            Ok(result) => result,
            Err(err) => {
                error!(tool = %tool, error = %err, "tool invocation task failed");
                ToolResult::failure(ErrorKind::InternalError, "internal error")
            }
        }
    }

    fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        arguments: &ToolArguments,
    ) -> Result<Value, ToolError> {
        let handler = descriptor.handler();
        panic::catch_unwind(AssertUnwindSafe(|| handler(&self.control, arguments)))
            .unwrap_or_else(|payload| {
                Err(ToolError::execution(format!(
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
    }
}

/// Checks arguments against a parameter schema.
///
/// Every required parameter must be present and non-null, every present value
/// must have its declared type, and names outside the schema are rejected.
/// A `null` optional argument counts as absent and is dropped from the result.
///
/// # Errors
/// Returns a message naming the offending parameter.
pub fn validate_arguments(
    params: &[ParamSpec],
    arguments: &ToolArguments,
) -> Result<ToolArguments, String> {
    if let Some(extra) = arguments
        .keys()
        .find(|name| !params.iter().any(|param| &param.name == *name))
    {
        return Err(format!("unexpected argument '{extra}'"));
    }

    let mut validated = ToolArguments::new();
    for param in params {
        match arguments.get(&param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(format!("missing required argument '{}'", param.name));
            }
            None | Some(Value::Null) => {}
            Some(value) if !param.param_type.accepts(value) => {
                return Err(format!(
                    "argument '{}' must be {}, got {}",
                    param.name,
                    article(param.param_type.as_str()),
                    json_type(value)
                ));
            }
            Some(value) => {
                validated.insert(param.name.clone(), value.clone());
            }
        }
    }
    Ok(validated)
}

fn article(type_name: &str) -> String {
    match type_name.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {type_name}"),
        _ => format!("a {type_name}"),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParamType, ToolModule};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tabular_core::reader::ReaderOptions;
    use tabular_core::source::{DataSources, LocalSource, LocalSourceConfig};

    static RECORDED_RAN: AtomicBool = AtomicBool::new(false);

    fn control() -> TabularControlPlane {
        TabularControlPlane::new(
            DataSources::new(LocalSource::new(LocalSourceConfig::default())),
            ReaderOptions::default(),
        )
    }

    fn test_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("recorded", "records that it ran", |_, args| {
                RECORDED_RAN.store(true, Ordering::SeqCst);
                Ok(Value::Object(args.clone()))
            })
            .with_param(ParamSpec::required("path", ParamType::String))
            .with_param(ParamSpec::optional("limit", ParamType::Integer))
            .with_param(ParamSpec::optional("strict", ParamType::Boolean)),
            ToolDescriptor::new("missing_file", "fails like a missing source", |_, _| {
                Err(ToolError::new(ErrorKind::NotFound, "source not found: a.csv"))
            }),
            ToolDescriptor::new("broken", "fails internally", |_, _| {
                Err(ToolError::execution("disk controller exploded at /dev/sda"))
            }),
            ToolDescriptor::new("panicking", "panics", |_, _| panic!("handler bug")),
        ]
    }

    fn dispatcher() -> Dispatcher {
        let modules: &[ToolModule] = &[("test", test_tools)];
        let registry = ToolRegistry::from_modules(modules).unwrap();
        Dispatcher::new(Arc::new(registry), control())
    }

    fn request(tool: &str, arguments: Value) -> ToolRequest {
        let Value::Object(arguments) = arguments else {
            panic!("arguments must be an object");
        };
        ToolRequest::new(tool, arguments)
    }

    #[test]
    fn unknown_tools_fail_without_running_anything() {
        let result = dispatcher().dispatch(&request("delete_everything", json!({})));
        assert_eq!(result.error_kind(), Some(ErrorKind::UnknownTool));
    }

    #[test]
    fn invalid_arguments_never_reach_the_handler() {
        let dispatcher = dispatcher();
        let cases = [
            json!({}),
            json!({"path": null}),
            json!({"path": 7}),
            json!({"path": "a.csv", "limit": "ten"}),
            json!({"path": "a.csv", "limit": 1.5}),
            json!({"path": "a.csv", "strict": "yes"}),
            json!({"path": "a.csv", "mode": "fast"}),
        ];
        for arguments in cases {
            let result = dispatcher.dispatch(&request("recorded", arguments.clone()));
            assert_eq!(
                result.error_kind(),
                Some(ErrorKind::InvalidArguments),
                "{arguments} should be rejected"
            );
        }
        assert!(!RECORDED_RAN.load(Ordering::SeqCst));
    }

    #[test]
    fn validation_messages_name_the_parameter() {
        let params = [
            ParamSpec::required("path", ParamType::String),
            ParamSpec::optional("limit", ParamType::Integer),
        ];
        let missing = validate_arguments(&params, &ToolArguments::new()).unwrap_err();
        assert_eq!(missing, "missing required argument 'path'");

        let args = request("x", json!({"path": "a", "limit": "9"})).arguments;
        let wrong = validate_arguments(&params, &args).unwrap_err();
        assert_eq!(wrong, "argument 'limit' must be an integer, got string");

        let args = request("x", json!({"path": "a", "other": 1})).arguments;
        let extra = validate_arguments(&params, &args).unwrap_err();
        assert_eq!(extra, "unexpected argument 'other'");
    }

    #[test]
    fn null_optional_arguments_are_dropped() {
        let params = [
            ParamSpec::required("path", ParamType::String),
            ParamSpec::optional("limit", ParamType::Integer),
        ];
        let args = request("x", json!({"path": "a", "limit": null})).arguments;
        let validated = validate_arguments(&params, &args).unwrap();
        assert_eq!(Value::Object(validated), json!({"path": "a"}));
    }

    #[test]
    fn source_failures_keep_their_kind_and_message() {
        let result = dispatcher().dispatch(&request("missing_file", json!({})));
        assert_eq!(
            result,
            ToolResult::failure(ErrorKind::NotFound, "source not found: a.csv")
        );
    }

    #[test]
    fn execution_failures_do_not_leak_their_cause() {
        let result = dispatcher().dispatch(&request("broken", json!({})));
        let ToolResult::Failure {
            error_kind,
            message,
        } = result
        else {
            panic!("expected failure");
        };
        assert_eq!(error_kind, ErrorKind::ExecutionError);
        assert!(!message.contains("/dev/sda"));
    }

    #[test]
    fn panicking_handlers_become_execution_errors() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch(&request("panicking", json!({})));
        assert_eq!(result.error_kind(), Some(ErrorKind::ExecutionError));

        let again = dispatcher.dispatch(&request("missing_file", json!({})));
        assert_eq!(again.error_kind(), Some(ErrorKind::NotFound));
    }
}
