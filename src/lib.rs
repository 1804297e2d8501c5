//! confluence-mcp: MCP server for Markdown rendering and Confluence conversion
//!
//! This library exposes Markdown conversion as MCP tools that AI assistants
//! can call over streamable HTTP or stdio.
//!
//! # Architecture
//!
//! - **Rendering**: Markdown to HTML, and Markdown to Confluence wiki markup
//! - **Templates**: Built-in Markdown document templates, optionally converted
//! - **Tool registry**: Named tools with JSON schemas, dispatched by `tools/call`
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: MCP protocol and transports
//! - [`render`]: Markdown renderers
//! - [`templates`]: Built-in document templates
//! - [`tools`]: Tool registry and tool implementations

pub mod config;
pub mod error;
pub mod mcp;
pub mod render;
pub mod templates;
pub mod tools;
