//! MCP server implementation.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls and other requests
//! 3. **Shutdown**: Graceful connection termination
//!
//! The server itself holds no connection state. Each transport keeps a
//! [`Session`] per client and passes it in with every message, so one
//! [`McpServer`] can serve a stdio client or many HTTP sessions at once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::mcp::protocol::{
    negotiate_version, parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId, SERVER_NAME,
};
use crate::tools::ToolRegistry;

/// Session state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for initialize request.
    #[default]
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Lifecycle state of one client connection.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
    protocol_version: Option<String>,
}

impl Session {
    /// Creates a session awaiting `initialize`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the negotiated protocol version, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Marks the session as shutting down.
    pub fn shut_down(&mut self) {
        self.state = SessionState::ShuttingDown;
    }
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// The MCP server: dispatches JSON-RPC messages against a tool registry.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Creates a server exposing the tools in `registry`.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handles one raw JSON-RPC message.
    ///
    /// Returns the reply to send, or `None` for notifications.
    pub fn handle_line(&self, session: &mut Session, line: &str) -> Option<OutgoingMessage> {
        match parse_message(line) {
            Ok(msg) => self.handle_message(session, msg),
            Err(error) => {
                debug!(code = error.error.code, "Rejected malformed message");
                Some(error.into())
            }
        }
    }

    /// Handles a parsed incoming message.
    ///
    /// Returns the reply to send, or `None` for notifications.
    pub fn handle_message(
        &self,
        session: &mut Session,
        msg: IncomingMessage,
    ) -> Option<OutgoingMessage> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(session, &req)),
            IncomingMessage::Notification(ref notif) => {
                Self::handle_notification(session, notif);
                None
            }
        }
    }

    /// Handles an incoming request.
    fn handle_request(&self, session: &mut Session, req: &JsonRpcRequest) -> OutgoingMessage {
        debug!(method = %req.method, id = %req.id, "Handling request");

        let response = match req.method.as_str() {
            "initialize" => Self::handle_initialize(session, req),
            "tools/list" => self.handle_tools_list(session, req),
            "tools/call" => self.handle_tools_call(session, req),
            "ping" => Ok(Self::handle_ping(req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        response.into()
    }

    /// Handles an incoming notification.
    fn handle_notification(session: &mut Session, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if session.state == SessionState::Initialising => {
                session.state = SessionState::Running;
                info!("Client initialised, session running");
            }
            method => debug!(method, "Ignoring notification"),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(
        session: &mut Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        if session.state != SessionState::AwaitingInit {
            return Err(JsonRpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid initialize params: {e}"),
                )
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing initialize params")
            })?;

        let negotiated_version = negotiate_version(&params.protocol_version);

        info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            requested_version = %params.protocol_version,
            negotiated_version,
            "Initialising session"
        );

        session.protocol_version = Some(negotiated_version.to_string());
        session.state = SessionState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(
        &self,
        session: &Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        Self::require_running(session, &req.id)?;

        let result = json!({
            "tools": self.registry.descriptors(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/call request.
    fn handle_tools_call(
        &self,
        session: &Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        Self::require_running(session, &req.id)?;

        let params: ToolCallParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid tool call params: {e}"),
                )
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params")
            })?;

        if !(params.arguments.is_object() || params.arguments.is_null()) {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                "Tool arguments must be an object",
            ));
        }

        let result = self
            .registry
            .invoke(&params.name, &params.arguments)
            .map_err(|e| match e {
                RegistryError::UnknownTool { .. } => {
                    JsonRpcError::invalid_params(req.id.clone(), e.to_string())
                }
                RegistryError::DuplicateTool { .. } => {
                    JsonRpcError::internal_error(req.id.clone(), e.to_string())
                }
            })?;

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Ensures the session is in the Running state.
    fn require_running(session: &Session, id: &RequestId) -> Result<(), JsonRpcError> {
        if session.state != SessionState::Running {
            return Err(JsonRpcError::invalid_request(
                Some(id.clone()),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}
