//! Tools the model may call, and the invoker seam the orchestration loop calls them through.
//!
//! The loop only knows the [`ToolInvoker`] trait: list the tool definitions to advertise,
//! and call a tool by name with its JSON arguments. [`ToolRegistry`] is the stock
//! implementation over a set of [`Tool`]s built with [`tool`].
//!
//! ## Failure contract
//!
//! - An unregistered name is [`Error::UnknownTool`]: a registration bug, fatal for the turn.
//! - Anything that goes wrong *inside* a tool, including a panic, comes back as
//!   [`Error::Tool`]. The loop turns that into an error payload for the model.
//!
//! ## Schema notation
//!
//! Parameter schemas may be given in a short form and are normalized to JSON Schema:
//!
//! - **Simple notation**: `{"city": "string", "days": "integer"}`
//! - **Typed schema**: `{"days": {"type": "integer", "optional": true}}`
//! - **Full JSON Schema**: passed through untouched
//!
//! ```rust,no_run
//! use agent_stream::tool;
//! use serde_json::json;
//!
//! let weather = tool("get_weather", "Current weather for a city")
//!     .param("city", "string")
//!     .build(|args| async move {
//!         let city = args["city"].as_str().unwrap_or("Unknown");
//!         Ok(json!({"city": city, "temp": 20}))
//!     });
//! ```

use crate::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased async tool handler.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// Vendor-neutral description of a callable tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

/// Maps tool names to callables.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Definitions sent with every request.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Invoke the named tool.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTool`] if `name` is not registered; [`Error::Tool`] if the tool
    /// itself failed.
    async fn call_function(&self, name: &str, arguments: Value) -> Result<Value>;
}

/// A named async function the model can call.
#[derive(Clone)]
pub struct Tool {
    name: String,

    description: String,

    input_schema: Value,

    handler: ToolHandler,
}

impl Tool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: normalize_schema(input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Run the handler. Errors are returned as-is; panics are not caught here.
    pub async fn execute(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Name-indexed set of [`Tool`]s; the default [`ToolInvoker`].
///
/// Registration order is preserved in [`definitions`](ToolInvoker::definitions).
/// Registering a second tool under an existing name replaces the first.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: impl IntoIterator<Item = Arc<Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.insert(tool);
        }
        registry
    }

    pub fn register(mut self, tool: Tool) -> Self {
        self.insert(Arc::new(tool));
        self
    }

    pub fn insert(&mut self, tool: Arc<Tool>) {
        match self.by_name.get(tool.name()) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.by_name.insert(tool.name().to_string(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Tool>> {
        self.by_name.get(name).map(|&slot| &self.tools[slot])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn call_function(&self, name: &str, arguments: Value) -> Result<Value> {
        let tool = self.get(name).ok_or_else(|| Error::unknown_tool(name))?;

        match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(Error::Tool(msg))) => Err(Error::Tool(msg)),
            Ok(Err(other)) => Err(Error::tool(other.to_string())),
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::warn!("tool '{}' panicked: {}", name, detail);
                Err(Error::tool(format!("tool '{}' panicked: {}", name, detail)))
            }
        }
    }
}

/// Normalize shorthand parameter notation into a JSON Schema object.
fn normalize_schema(schema: Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return json!({
            "type": "object",
            "properties": {},
            "required": []
        });
    };

    if obj.contains_key("type") && obj.contains_key("properties") {
        return schema;
    }

    let mut properties = Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        if let Some(type_str) = param_type.as_str() {
            // Simple notation has no way to say optional
            properties.insert(param_name.clone(), type_to_json_schema(type_str));
            required.push(param_name.clone());
        } else if let Some(prop_obj) = param_type.as_object() {
            let mut prop = prop_obj.clone();

            // Neither flag is JSON Schema; strip them after reading
            let is_optional = prop
                .remove("optional")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let is_required = prop.remove("required").and_then(|v| v.as_bool());
            let has_default = prop.contains_key("default");

            properties.insert(param_name.clone(), Value::Object(prop));

            let required_here = match is_required {
                Some(explicit) => explicit,
                None => !is_optional && !has_default,
            };
            if required_here {
                required.push(param_name.clone());
            }
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        // Unknown names fall back to string
        _ => "string",
    };

    json!({ "type": json_type })
}

/// Builder returned by [`tool`].
pub struct ToolBuilder {
    name: String,

    description: String,

    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({}),
        }
    }

    /// Replace the schema entirely.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add one parameter in simple notation.
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        match self.schema.as_object_mut() {
            Some(obj) => {
                obj.insert(name.to_string(), Value::String(type_str.to_string()));
            }
            None => {
                self.schema = json!({ name: type_str });
            }
        }
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.schema, handler)
    }
}

/// Start building a [`Tool`].
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}
