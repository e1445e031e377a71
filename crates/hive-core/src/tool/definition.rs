//! Capability descriptors and schema helpers

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

pub use crate::llm::ToolDefinition;
use crate::tool::{Tool, ToolContext, ToolResult};
use crate::{Error, Result};

/// Helper functions for creating tool schemas
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Create an object schema with descriptions for properties
    ///
    /// # Arguments
    /// * `properties` - A list of tuples (name, type, description, required)
    ///
    /// # Example
    /// ```ignore
    /// let schema = SchemaBuilder::object_schema(vec![
    ///     ("plan", "string", "Markdown checklist", true),
    /// ]);
    /// ```
    pub fn object_schema(properties: Vec<(&str, &str, &str, bool)>) -> JsonValue {
        let props: serde_json::Map<String, JsonValue> = properties
            .iter()
            .map(|(name, type_str, desc, _)| {
                (
                    name.to_string(),
                    json!({"type": type_str, "description": desc}),
                )
            })
            .collect();

        let required: Vec<&str> = properties
            .iter()
            .filter(|(_, _, _, required)| *required)
            .map(|(name, _, _, _)| *name)
            .collect();

        json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }

    /// Schema taking no parameters
    pub fn empty_object() -> JsonValue {
        json!({"type": "object", "properties": {}, "required": []})
    }

    /// Array-of-strings property
    pub fn string_array(description: &str) -> JsonValue {
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": description
        })
    }
}

/// A named capability bound to its handler
///
/// The descriptor's name, description and parameter schema are what the
/// backend sees. `source_text`, when present, is shown to the model as a
/// reference so it can reason about what the capability actually does.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    name: String,
    description: String,
    parameters: JsonValue,
    handler: Arc<dyn Tool>,
    source_text: Option<String>,
}

impl CapabilityDescriptor {
    /// Describe a tool using its own name, description and schema
    pub fn from_tool(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.input_schema(),
            handler: tool,
            source_text: None,
        }
    }

    pub fn builder(name: impl Into<String>) -> CapabilityDescriptorBuilder {
        CapabilityDescriptorBuilder::new(name)
    }

    /// Attach literal source text for the model to read
    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &JsonValue {
        &self.parameters
    }

    pub fn source_text(&self) -> Option<&str> {
        self.source_text.as_deref()
    }

    /// Definition sent to the backend
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.parameters.clone())
    }

    /// Run the handler
    pub async fn invoke(&self, ctx: &ToolContext<'_>, input: JsonValue) -> Result<ToolResult> {
        self.handler.execute(ctx, input).await
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("has_source_text", &self.source_text.is_some())
            .finish()
    }
}

/// Builder for [`CapabilityDescriptor`]
pub struct CapabilityDescriptorBuilder {
    name: String,
    description: String,
    parameters: Option<JsonValue>,
    handler: Option<Arc<dyn Tool>>,
    source_text: Option<String>,
}

impl CapabilityDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: None,
            handler: None,
            source_text: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parameters(mut self, schema: JsonValue) -> Self {
        self.parameters = Some(schema);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn Tool>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Use a plain closure as the handler
    pub fn handler_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ToolContext<'_>, JsonValue) -> Result<ToolResult> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(FnTool::new(self.name.clone(), f)));
        self
    }

    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    pub fn build(self) -> Result<CapabilityDescriptor> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration(
                "Capability name must not be empty".to_string(),
            ));
        }
        let handler = self.handler.ok_or_else(|| {
            Error::Configuration(format!("Capability '{}' has no handler", self.name))
        })?;
        Ok(CapabilityDescriptor {
            parameters: self
                .parameters
                .unwrap_or_else(|| handler.input_schema()),
            name: self.name,
            description: self.description,
            handler,
            source_text: self.source_text,
        })
    }
}

type HandlerFn = dyn Fn(&ToolContext<'_>, JsonValue) -> Result<ToolResult> + Send + Sync;

/// Tool backed by a synchronous closure
pub struct FnTool {
    name: String,
    handler: Box<HandlerFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ToolContext<'_>, JsonValue) -> Result<ToolResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(f),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        ""
    }

    fn input_schema(&self) -> JsonValue {
        SchemaBuilder::empty_object()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: JsonValue) -> Result<ToolResult> {
        (self.handler)(ctx, input)
    }
}
