//! Markdown conversion tools.

use serde_json::{json, Value};

use super::{
    optional_str, options_for, required_str, theme_schema, ToolDescriptor, ToolHandler, ToolOutput,
};
use crate::error::ToolError;
use crate::render::{self, ConvertOptions};

/// `render_markdown`: Markdown in, HTML out.
#[derive(Debug, Clone, Copy)]
pub struct RenderMarkdownTool {
    max_input_bytes: usize,
}

impl RenderMarkdownTool {
    /// Tool name.
    pub const NAME: &'static str = "render_markdown";

    /// Creates the tool with an input size limit.
    #[must_use]
    pub const fn new(max_input_bytes: usize) -> Self {
        Self { max_input_bytes }
    }

    /// Descriptor for `tools/list`.
    #[must_use]
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "Render a Markdown document (CommonMark with GFM tables, strikethrough and \
             task lists) to HTML. Empty input returns an empty string.",
            json!({
                "type": "object",
                "properties": {
                    "markdown": {
                        "type": "string",
                        "description": "Markdown source text"
                    }
                },
                "required": ["markdown"]
            }),
        )
    }
}

impl ToolHandler for RenderMarkdownTool {
    fn call(&self, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let markdown = required_str(arguments, "markdown")?;
        let html = render::html::render_limited(markdown, self.max_input_bytes)?;
        Ok(ToolOutput::text(html))
    }
}

/// `convert_markdown`: Markdown in, Confluence wiki markup out.
#[derive(Debug, Clone)]
pub struct ConvertMarkdownTool {
    defaults: ConvertOptions,
}

impl ConvertMarkdownTool {
    /// Tool name.
    pub const NAME: &'static str = "convert_markdown";

    /// Creates the tool. `defaults` apply when a call gives no theme.
    #[must_use]
    pub const fn new(defaults: ConvertOptions) -> Self {
        Self { defaults }
    }

    /// Descriptor for `tools/list`.
    #[must_use]
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "Convert a Markdown document to Confluence wiki markup. Headings, emphasis, \
             links, images, lists, block quotes, tables and fenced code blocks are \
             supported.",
            json!({
                "type": "object",
                "properties": {
                    "markdown": {
                        "type": "string",
                        "description": "Markdown source text"
                    },
                    "theme": theme_schema()
                },
                "required": ["markdown"]
            }),
        )
    }
}

impl ToolHandler for ConvertMarkdownTool {
    fn call(&self, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let markdown = required_str(arguments, "markdown")?;
        let theme = optional_str(arguments, "theme")?;
        let options = options_for(&self.defaults, theme);
        Ok(ToolOutput::text(render::convert(markdown, &options)?))
    }
}
