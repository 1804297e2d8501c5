//! JSON-RPC 2.0 framing for MCP.
//!
//! Incoming lines are parsed into [`IncomingMessage`]: a request carries an
//! `id` and gets exactly one reply, a notification has no `id` and gets none.
//! Replies leave the server as [`OutgoingMessage`].
//!
//! Request IDs are strings or integers; `null` is rejected. Batches are not
//! accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol versions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

/// The newest protocol version this server speaks.
pub const MCP_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "confluence-mcp";

/// Picks the protocol version to answer an `initialize` request with.
///
/// The client's version is echoed back when supported; otherwise the server
/// offers its newest version and leaves it to the client to disconnect.
#[must_use]
pub fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .into_iter()
        .find(|v| *v == requested)
        .unwrap_or(MCP_PROTOCOL_VERSION)
}

/// A JSON-RPC 2.0 request ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A request: has an `id` and expects a reply.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Request identifier, echoed in the reply.
    pub id: RequestId,

    /// The method to invoke.
    pub method: String,

    /// Method parameters, if any.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A notification: no `id`, no reply.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// The notification method.
    pub method: String,
}

/// A successful reply.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: &'static str,

    /// The request ID this response answers.
    pub id: RequestId,

    /// The method's result.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a success reply to request `id`.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

/// JSON-RPC error codes used by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// The message is not valid JSON.
    ParseError = -32700,
    /// The JSON is not an acceptable message, or arrived in the wrong state.
    InvalidRequest = -32600,
    /// No such method.
    MethodNotFound = -32601,
    /// Bad method parameters, including unknown tool names.
    InvalidParams = -32602,
    /// The server failed while producing a reply.
    InternalError = -32603,
}

impl ErrorCode {
    /// The numeric code sent on the wire.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// The `error` member of an error reply.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    /// Numeric error code.
    pub code: i32,

    /// Human-readable description.
    pub message: String,
}

/// An error reply.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    jsonrpc: &'static str,

    /// The request ID, when it could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// The error details.
    pub error: ErrorObject,
}

impl JsonRpcError {
    /// Creates an error reply.
    #[must_use]
    pub fn new(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: ErrorObject {
                code: code.code(),
                message: message.into(),
            },
        }
    }

    /// Malformed JSON. The ID is never known.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, ErrorCode::ParseError, "Parse error")
    }

    /// A message that is not an acceptable request, or one sent in the wrong
    /// session state.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::InvalidRequest, message)
    }

    /// Unknown method.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            ErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Bad parameters.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(Some(id), ErrorCode::InvalidParams, message)
    }

    /// Server-side failure.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(Some(id), ErrorCode::InternalError, message)
    }
}

/// A reply to an incoming request: either a result or an error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    /// A successful response.
    Response(JsonRpcResponse),
    /// An error response.
    Error(JsonRpcError),
}

impl OutgoingMessage {
    /// Returns `true` for error responses.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<JsonRpcResponse> for OutgoingMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for OutgoingMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

impl From<Result<JsonRpcResponse, JsonRpcError>> for OutgoingMessage {
    fn from(result: Result<JsonRpcResponse, JsonRpcError>) -> Self {
        match result {
            Ok(response) => Self::Response(response),
            Err(error) => Self::Error(error),
        }
    }
}

/// A parsed incoming message.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Returns the request ID if this is a request.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Notification(_) => None,
        }
    }
}

/// Parses one JSON-RPC message.
///
/// # Errors
///
/// Returns a parse error for malformed JSON and an invalid-request error for
/// anything that is not a single JSON-RPC 2.0 request or notification.
pub fn parse_message(json: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value = serde_json::from_str(json).map_err(|_| JsonRpcError::parse_error())?;

    let Some(obj) = value.as_object() else {
        return Err(JsonRpcError::invalid_request(None, "Expected a JSON-RPC object"));
    };
    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcError::invalid_request(None, "jsonrpc must be \"2.0\""));
    }

    let message = if obj.contains_key("id") {
        serde_json::from_value(value).map(IncomingMessage::Request)
    } else {
        serde_json::from_value(value).map(IncomingMessage::Notification)
    }
    .map_err(|e| JsonRpcError::invalid_request(None, format!("Invalid Request: {e}")))?;

    let method = match &message {
        IncomingMessage::Request(req) => &req.method,
        IncomingMessage::Notification(notif) => &notif.method,
    };
    if method.is_empty() {
        return Err(JsonRpcError::invalid_request(
            message.id().cloned(),
            "method must not be empty",
        ));
    }

    Ok(message)
}
