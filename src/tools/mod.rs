//! Tool registry and the tools exposed over MCP.
//!
//! A tool is a [`ToolDescriptor`] (name, description, JSON schemas) paired
//! with a [`ToolHandler`]. The registry owns both and dispatches
//! `tools/call` requests by name:
//!
//! - [`markdown`]: `render_markdown` (HTML) and `convert_markdown` (wiki markup)
//! - [`template`]: `list_templates`, `get_template`, `convert_template`
//!
//! The registry is built once at startup and shared read-only afterwards.

pub mod markdown;
pub mod template;

pub use markdown::{ConvertMarkdownTool, RenderMarkdownTool};
pub use template::{ConvertTemplateTool, GetTemplateTool, ListTemplatesTool};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RegistryError, ToolError};
use crate::render::confluence::is_known_theme;
use crate::render::ConvertOptions;
use crate::templates::TemplateRepository;

/// Describes a tool in `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
    /// JSON Schema for the tool's structured output, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ToolDescriptor {
    /// Creates a descriptor without an output schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
        }
    }

    /// Adds an output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// A JSON object, sent both as text and as structured content.
    Json(Value),
}

impl ToolOutput {
    /// Creates a text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Serialises `value` into a JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Serialisation`] if `value` cannot be serialised.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Machine-readable copy of the content for tools with an output schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: true,
        }
    }

    /// The text of the first content item.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| match c {
            ToolContent::Text { text } => text.as_str(),
        })
    }
}

impl From<ToolOutput> for ToolCallResult {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(text) => Self::text(text),
            ToolOutput::Json(value) => {
                let text =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                Self {
                    content: vec![ToolContent::Text { text }],
                    structured_content: Some(value),
                    is_error: false,
                }
            }
        }
    }
}

/// Executes a tool call.
///
/// Implemented for closures taking the call arguments, so ad-hoc tools can be
/// registered without a dedicated type.
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with the `arguments` object of the call.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] if the arguments are invalid or the tool fails.
    fn call(&self, arguments: &Value) -> Result<ToolOutput, ToolError>;
}

impl<F> ToolHandler for F
where
    F: Fn(&Value) -> Result<ToolOutput, ToolError> + Send + Sync,
{
    fn call(&self, arguments: &Value) -> Result<ToolOutput, ToolError> {
        self(arguments)
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Box<dyn ToolHandler>,
}

/// Maps tool names to their descriptors and handlers.
///
/// Iteration follows registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if a tool with the same name
    /// is already registered. The registry is left unchanged.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), RegistryError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool {
                name: descriptor.name,
            });
        }

        debug!(tool = %descriptor.name, "Registered tool");
        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                descriptor,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Invokes the tool called `name`.
    ///
    /// Handler failures are not errors at this level: they come back as a
    /// result with `is_error` set and the failure message as text.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTool`] if no tool is called `name`.
    pub fn invoke(&self, name: &str, arguments: &Value) -> Result<ToolCallResult, RegistryError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool {
                name: name.to_string(),
            })?;

        match tool.handler.call(arguments) {
            Ok(output) => {
                debug!(tool = name, "Tool call succeeded");
                Ok(output.into())
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                Ok(ToolCallResult::error(e.to_string()))
            }
        }
    }

    /// Looks up the descriptor of a tool.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| &t.descriptor)
    }

    /// All descriptors, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().map(|t| &t.descriptor).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Builds the registry with every tool this server exposes.
///
/// `defaults` supplies the input limit and the theme used when a call does
/// not name one.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateTool`] if two tools share a name.
pub fn default_registry(defaults: &ConvertOptions) -> Result<ToolRegistry, RegistryError> {
    let repository = TemplateRepository::new();
    let mut registry = ToolRegistry::new();

    registry.register(
        RenderMarkdownTool::descriptor(),
        RenderMarkdownTool::new(defaults.input_limit()),
    )?;
    registry.register(
        ConvertMarkdownTool::descriptor(),
        ConvertMarkdownTool::new(defaults.clone()),
    )?;
    registry.register(
        ListTemplatesTool::descriptor(),
        ListTemplatesTool::new(repository),
    )?;
    registry.register(
        GetTemplateTool::descriptor(),
        GetTemplateTool::new(repository),
    )?;
    registry.register(
        ConvertTemplateTool::descriptor(),
        ConvertTemplateTool::new(repository, defaults.clone()),
    )?;

    Ok(registry)
}

// ==================== Argument Helpers ====================

/// Extracts a required string argument.
pub(crate) fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ToolError::invalid_arguments(format!(
            "parameter '{name}' must be a string"
        ))),
        None => Err(ToolError::invalid_arguments(format!(
            "missing required parameter: {name}"
        ))),
    }
}

/// Extracts an optional string argument. `null` counts as absent.
pub(crate) fn optional_str<'a>(
    arguments: &'a Value,
    name: &str,
) -> Result<Option<&'a str>, ToolError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(ToolError::invalid_arguments(format!(
            "parameter '{name}' must be a string"
        ))),
    }
}

/// Applies a per-call theme over the configured defaults.
///
/// A blank or missing theme keeps the default. An unrecognised per-call
/// theme is passed through with a warning; the configured default is
/// checked once at startup instead.
pub(crate) fn options_for(defaults: &ConvertOptions, theme: Option<&str>) -> ConvertOptions {
    match theme.map(str::trim).filter(|t| !t.is_empty()) {
        Some(theme) => {
            if !is_known_theme(theme) {
                warn!(theme, "Unrecognised code block theme, passing it through");
            }
            defaults.clone().theme(Some(theme.to_string()))
        }
        None => defaults.clone(),
    }
}

/// Schema fragment for the optional `theme` argument.
pub(crate) fn theme_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "description": format!(
            "Code block theme ({}). Omit to use the server default (no theme unless configured).",
            crate::render::KNOWN_THEMES.join(", ")
        )
    })
}
