//! Template tools.
//!
//! All three return JSON, so each descriptor carries an output schema and
//! results include `structuredContent`.

use serde::Serialize;
use serde_json::{json, Value};

use super::{
    optional_str, options_for, required_str, theme_schema, ToolDescriptor, ToolHandler, ToolOutput,
};
use crate::error::ToolError;
use crate::render::{self, ConvertOptions};
use crate::templates::{Template, TemplateRepository};

/// Template metadata without the body.
#[derive(Debug, Serialize)]
struct TemplateSummary {
    id: &'static str,
    name: &'static str,
    description: &'static str,
}

impl From<&Template> for TemplateSummary {
    fn from(t: &Template) -> Self {
        Self {
            id: t.id,
            name: t.name,
            description: t.description,
        }
    }
}

#[derive(Debug, Serialize)]
struct TemplateList {
    templates: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertedTemplate {
    id: &'static str,
    name: &'static str,
    confluence_markup: String,
}

fn template_id_schema(repository: TemplateRepository) -> Value {
    json!({
        "type": "string",
        "description": format!("Template ID ({})", repository.ids().join(", "))
    })
}

fn lookup(
    repository: TemplateRepository,
    arguments: &Value,
) -> Result<&'static Template, ToolError> {
    let id = required_str(arguments, "template_id")?;
    repository
        .find_by_id(id)
        .ok_or_else(|| ToolError::TemplateNotFound { id: id.to_string() })
}

/// `list_templates`: metadata of every template.
#[derive(Debug, Clone, Copy)]
pub struct ListTemplatesTool {
    repository: TemplateRepository,
}

impl ListTemplatesTool {
    /// Tool name.
    pub const NAME: &'static str = "list_templates";

    /// Creates the tool.
    #[must_use]
    pub const fn new(repository: TemplateRepository) -> Self {
        Self { repository }
    }

    /// Descriptor for `tools/list`.
    #[must_use]
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "List the available Markdown document templates (ID, name and description).",
            json!({
                "type": "object",
                "properties": {}
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "properties": {
                "templates": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["id", "name", "description"]
                    }
                }
            },
            "required": ["templates"]
        }))
    }
}

impl ToolHandler for ListTemplatesTool {
    fn call(&self, _arguments: &Value) -> Result<ToolOutput, ToolError> {
        let list = TemplateList {
            templates: self.repository.find_all().iter().map(Into::into).collect(),
        };
        ToolOutput::json(&list)
    }
}

/// `get_template`: one template including its Markdown body.
#[derive(Debug, Clone, Copy)]
pub struct GetTemplateTool {
    repository: TemplateRepository,
}

impl GetTemplateTool {
    /// Tool name.
    pub const NAME: &'static str = "get_template";

    /// Creates the tool.
    #[must_use]
    pub const fn new(repository: TemplateRepository) -> Self {
        Self { repository }
    }

    /// Descriptor for `tools/list`.
    #[must_use]
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "Get a Markdown document template, including its Markdown content.",
            json!({
                "type": "object",
                "properties": {
                    "template_id": template_id_schema(TemplateRepository::new())
                },
                "required": ["template_id"]
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "name": { "type": "string" },
                "description": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["id", "name", "description", "content"]
        }))
    }
}

impl ToolHandler for GetTemplateTool {
    fn call(&self, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let template = lookup(self.repository, arguments)?;
        ToolOutput::json(template)
    }
}

/// `convert_template`: a template converted to wiki markup.
#[derive(Debug, Clone)]
pub struct ConvertTemplateTool {
    repository: TemplateRepository,
    defaults: ConvertOptions,
}

impl ConvertTemplateTool {
    /// Tool name.
    pub const NAME: &'static str = "convert_template";

    /// Creates the tool. `defaults` apply when a call gives no theme.
    #[must_use]
    pub const fn new(repository: TemplateRepository, defaults: ConvertOptions) -> Self {
        Self {
            repository,
            defaults,
        }
    }

    /// Descriptor for `tools/list`.
    #[must_use]
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "Convert a Markdown document template to Confluence wiki markup.",
            json!({
                "type": "object",
                "properties": {
                    "template_id": template_id_schema(TemplateRepository::new()),
                    "theme": theme_schema()
                },
                "required": ["template_id"]
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "name": { "type": "string" },
                "confluenceMarkup": { "type": "string" }
            },
            "required": ["id", "name", "confluenceMarkup"]
        }))
    }
}

impl ToolHandler for ConvertTemplateTool {
    fn call(&self, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let template = lookup(self.repository, arguments)?;
        let theme = optional_str(arguments, "theme")?;
        let options = options_for(&self.defaults, theme);

        ToolOutput::json(&ConvertedTemplate {
            id: template.id,
            name: template.name,
            confluence_markup: render::convert(template.content, &options)?,
        })
    }
}
