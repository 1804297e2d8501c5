//! Error types for confluence-mcp.
//!
//! Rendering failures live in [`crate::render::RenderError`]; this module
//! holds the configuration, registry and tool errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::render::RenderError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised by the tool registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("tool already registered: {name}")]
    DuplicateTool {
        /// The clashing tool name.
        name: String,
    },

    /// No tool with this name is registered.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },
}

/// Errors returned by a tool handler.
///
/// These never abort the server: the registry turns them into a tool result
/// flagged with `isError`.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A required argument is missing or has the wrong type.
    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        /// What is wrong with the arguments.
        message: String,
    },

    /// The Markdown input could not be converted.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// No template with the requested ID exists.
    #[error("Template not found: {id}")]
    TemplateNotFound {
        /// The requested template ID.
        id: String,
    },

    /// The tool produced a value that could not be serialised.
    #[error("Failed to serialise tool output")]
    Serialisation(#[from] serde_json::Error),
}

impl ToolError {
    /// Creates an invalid arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}
