//! Tool catalog built once at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tabular_core::control::TabularControlPlane;

use crate::protocol::{ToolArguments, ToolError};
use crate::tools;

/// Handler invoked with validated arguments.
pub type ToolHandler =
    Arc<dyn Fn(&TabularControlPlane, &ToolArguments) -> Result<Value, ToolError> + Send + Sync>;

/// A module of tools: its name and the descriptors it declares, in order.
pub type ToolModule = (&'static str, fn() -> Vec<ToolDescriptor>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    /// Returns true when `value` has this type. Integers must fit in `i64`.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.as_i64().is_some(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a tool's parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
}

impl ParamSpec {
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
        }
    }
}

/// Advertised form of a tool: name, description, and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

/// A named tool with its parameter schema and handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    handler: ToolHandler,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    #[must_use]
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&TabularControlPlane, &ToolArguments) -> Result<Value, ToolError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    #[must_use]
    pub const fn handler(&self) -> &ToolHandler {
        &self.handler
    }

    #[must_use]
    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// JSON Schema object describing the parameters.
    #[must_use]
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), json!({ "type": param.param_type.as_str() }));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), Value::Array(required));
        schema.insert("additionalProperties".to_string(), Value::Bool(false));
        schema
    }
}

/// Registry failures, carrying the offending tool name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    DuplicateTool(String),
    ToolNotFound(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTool(name) => write!(f, "duplicate tool name: {name}"),
            Self::ToolNotFound(name) => write!(f, "unknown tool: {name}"),
        }
    }
}

impl Error for RegistryError {}

/// Read-only catalog of tools keyed by exact, case-sensitive name.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every tool of the built-in modules.
    ///
    /// # Errors
    /// Returns `DuplicateTool` if two modules declare the same tool name.
    pub fn discover() -> Result<Self, RegistryError> {
        Self::from_modules(tools::MODULES)
    }

    /// Registers tools module by module in lexical module order, then in
    /// declaration order within each module.
    ///
    /// # Errors
    /// Returns `DuplicateTool` on the first repeated tool name.
    pub fn from_modules(modules: &[ToolModule]) -> Result<Self, RegistryError> {
        let mut ordered = modules.to_vec();
        ordered.sort_by_key(|(module, _)| *module);
        let mut registry = Self::new();
        for (_, descriptors) in ordered {
            for descriptor in descriptors() {
                registry.register(descriptor)?;
            }
        }
        Ok(registry)
    }

    /// Adds a tool. An existing tool with the same name is kept.
    ///
    /// # Errors
    /// Returns `DuplicateTool` if the name is already registered.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Looks up a tool by exact name.
    ///
    /// # Errors
    /// Returns `ToolNotFound` if no tool has that name.
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|position| &self.tools[*position])
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    /// All tools in registration order.
    #[must_use]
    pub fn list_all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    #[must_use]
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.tools.iter().map(ToolDescriptor::catalog_entry).collect()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
