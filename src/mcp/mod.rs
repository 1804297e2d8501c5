//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing Markdown
//! conversion operations as tools to AI assistants. Messages are JSON-RPC 2.0,
//! carried over either streamable HTTP or stdio.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│  Registry   │    │
//! │   │(http/stdio) │    │  (sessions) │    │   (tools)   │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────────────────────────────────────────┐      │
//! │   │              JSON-RPC Messages                  │      │
//! │   └─────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! Protocol versions 2025-06-18, 2025-03-26 and 2024-11-05 are accepted; see
//! [`protocol::negotiate_version`].

pub mod http;
pub mod protocol;
pub mod server;
pub mod transport;

pub use http::{HttpOptions, HttpTransport};
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, MCP_PROTOCOL_VERSION,
};
pub use server::{McpServer, Session, SessionState};
pub use transport::StdioTransport;
