//! Built-in Markdown document templates.
//!
//! Templates are compiled into the binary and never change at runtime.

use serde::Serialize;

/// A Markdown document template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    /// Unique identifier, e.g. `basic-doc`.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// What the template is for.
    pub description: &'static str,
    /// Markdown body.
    pub content: &'static str,
}

static BUILTIN: [Template; 4] = [
    Template {
        id: "basic-doc",
        name: "Basic Document",
        description: "General-purpose document with overview, features, setup steps and references",
        content: include_str!("basic-doc.md"),
    },
    Template {
        id: "table-doc",
        name: "Table Document",
        description: "Document built around comparison and schedule tables",
        content: include_str!("table-doc.md"),
    },
    Template {
        id: "api-doc",
        name: "API Document",
        description: "REST API reference with endpoints, request, response and error tables",
        content: include_str!("api-doc.md"),
    },
    Template {
        id: "meeting-note",
        name: "Meeting Notes",
        description: "Meeting minutes with agenda, decisions and action items",
        content: include_str!("meeting-note.md"),
    },
];

/// Read-only access to the available templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRepository;

impl TemplateRepository {
    /// Creates a repository over the built-in templates.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// All templates, in a stable order.
    #[must_use]
    pub fn find_all(&self) -> &'static [Template] {
        &BUILTIN
    }

    /// Looks up a template by its ID.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&'static Template> {
        BUILTIN.iter().find(|t| t.id == id)
    }

    /// IDs of all templates, for error messages and schema descriptions.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        BUILTIN.iter().map(|t| t.id).collect()
    }
}
