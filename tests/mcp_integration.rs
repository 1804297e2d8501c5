//! Integration tests for MCP protocol handling.
//!
//! These tests verify the MCP server's JSON-RPC 2.0 protocol implementation,
//! including request/response handling, error responses, and lifecycle management.

use confluence_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use confluence_mcp::mcp::{McpServer, Session, SessionState};
use confluence_mcp::render::ConvertOptions;
use confluence_mcp::tools::default_registry;
use serde_json::{json, Value};

fn server() -> McpServer {
    McpServer::new(default_registry(&ConvertOptions::default()).unwrap())
}

fn send(server: &McpServer, session: &mut Session, message: &Value) -> Option<Value> {
    server
        .handle_line(session, &message.to_string())
        .map(|reply| serde_json::to_value(reply).unwrap())
}

fn initialised(server: &McpServer) -> Session {
    let mut session = Session::new();
    send(
        server,
        &mut session,
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0.0" }
            }
        }),
    )
    .unwrap();
    send(
        server,
        &mut session,
        &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    );
    session
}

fn call_tool(server: &McpServer, session: &mut Session, name: &str, arguments: Value) -> Value {
    send(
        server,
        session,
        &json!({
            "jsonrpc": "2.0",
            "id": 10,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }),
    )
    .unwrap()
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::Number(1));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Notification(notif) = result.unwrap() {
        assert_eq!(notif.method, "notifications/initialized");
    } else {
        panic!("Expected Notification");
    }
}

#[test]
fn test_parse_invalid_json() {
    assert!(parse_message("not valid json").is_err());
}

#[test]
fn test_parse_missing_jsonrpc_version() {
    let json = r#"{
        "id": 1,
        "method": "test"
    }"#;

    assert!(parse_message(json).is_err());
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_full_lifecycle() {
    let server = server();
    let mut session = Session::new();

    let init = send(
        &server,
        &mut session,
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2025-03-26", "capabilities": {} }
        }),
    )
    .unwrap();
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    assert!(init["result"]["capabilities"]["tools"].is_object());
    assert_eq!(session.state(), SessionState::Initialising);

    let ack = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    );
    assert!(ack.is_none());
    assert_eq!(session.state(), SessionState::Running);

    let list = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    )
    .unwrap();
    let names: Vec<_> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        [
            "render_markdown",
            "convert_markdown",
            "list_templates",
            "get_template",
            "convert_template"
        ]
    );
}

#[test]
fn test_tools_call_before_initialised() {
    let server = server();
    let mut session = Session::new();
    let reply = call_tool(&server, &mut session, "render_markdown", json!({"markdown": "x"}));
    assert_eq!(reply["error"]["code"], -32600);
}

#[test]
fn test_sessions_are_independent() {
    let server = server();
    let mut ready = initialised(&server);
    let mut fresh = Session::new();

    let ok = call_tool(&server, &mut ready, "list_templates", json!({}));
    assert!(ok.get("result").is_some());

    let rejected = call_tool(&server, &mut fresh, "list_templates", json!({}));
    assert_eq!(rejected["error"]["code"], -32600);
}

// =============================================================================
// Tool Call Tests
// =============================================================================

#[test]
fn test_render_markdown() {
    let server = server();
    let mut session = initialised(&server);
    let reply = call_tool(&server, &mut session, "render_markdown", json!({"markdown": "# Hello"}));
    let html = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert!(html.contains("<h1>Hello</h1>"));
}

#[test]
fn test_render_markdown_empty() {
    let server = server();
    let mut session = initialised(&server);
    let reply = call_tool(&server, &mut session, "render_markdown", json!({"markdown": ""}));
    assert_eq!(reply["result"]["content"][0]["text"], "");
    assert!(reply["result"].get("isError").is_none());
}

#[test]
fn test_convert_markdown_with_theme() {
    let server = server();
    let mut session = initialised(&server);
    let reply = call_tool(
        &server,
        &mut session,
        "convert_markdown",
        json!({"markdown": "```python\nprint(1)\n```", "theme": "DJango"}),
    );
    let markup = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert!(markup.contains("{code:language=python|theme=DJango}"));
}

#[test]
fn test_convert_template_structured_content() {
    let server = server();
    let mut session = initialised(&server);
    let reply = call_tool(
        &server,
        &mut session,
        "convert_template",
        json!({"template_id": "meeting-note"}),
    );
    let structured = &reply["result"]["structuredContent"];
    assert_eq!(structured["id"], "meeting-note");
    assert!(structured["confluenceMarkup"]
        .as_str()
        .unwrap()
        .starts_with("h1. "));

    let text: Value =
        serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(&text, structured);
}

#[test]
fn test_missing_argument_is_tool_error() {
    let server = server();
    let mut session = initialised(&server);
    let reply = call_tool(&server, &mut session, "convert_markdown", json!({}));
    assert_eq!(reply["result"]["isError"], true);
    assert!(reply["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("markdown"));
}

#[test]
fn test_unknown_tool_is_protocol_error() {
    let server = server();
    let mut session = initialised(&server);
    let reply = call_tool(&server, &mut session, "nonexistent", json!({}));
    assert_eq!(reply["error"]["code"], -32602);
    assert_eq!(reply["id"], 10);
}

#[test]
fn test_oversized_input_is_tool_error() {
    let server = McpServer::new(
        default_registry(&ConvertOptions::default().max_input_bytes(16)).unwrap(),
    );
    let mut session = initialised(&server);
    let reply = call_tool(
        &server,
        &mut session,
        "render_markdown",
        json!({"markdown": "# This heading is longer than sixteen bytes"}),
    );
    assert_eq!(reply["result"]["isError"], true);
    assert!(reply["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("too large"));
}
