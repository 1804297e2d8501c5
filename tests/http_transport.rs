//! Integration tests for the streamable HTTP transport.
//!
//! Each test binds a fresh listener on an OS-assigned port and talks to it
//! with a real HTTP client.

use std::net::SocketAddr;
use std::time::Duration;

use confluence_mcp::mcp::http::SESSION_HEADER;
use confluence_mcp::mcp::{HttpOptions, HttpTransport, McpServer};
use confluence_mcp::render::ConvertOptions;
use confluence_mcp::tools::default_registry;
use reqwest::StatusCode;
use serde_json::{json, Value};

const MIB: usize = 1024 * 1024;

async fn start() -> HttpTransport {
    start_with(ConvertOptions::default(), HttpOptions::default()).await
}

async fn start_with(convert: ConvertOptions, http: HttpOptions) -> HttpTransport {
    let server = McpServer::new(default_registry(&convert).unwrap());
    HttpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0)), server, http)
        .await
        .unwrap()
}

fn mcp_url(transport: &HttpTransport) -> String {
    format!("http://{}/mcp", transport.addr())
}

fn initialize_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": { "name": "http-test" }
        }
    })
}

/// Sends `initialize` and returns the new session ID.
async fn initialize(client: &reqwest::Client, url: &str) -> String {
    let response = client
        .post(url)
        .json(&initialize_request())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(SESSION_HEADER)
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Initialises a session, acknowledges it, and returns its ID.
async fn open_session(client: &reqwest::Client, url: &str) -> String {
    let session = initialize(client, url).await;

    let ack = client
        .post(url)
        .header(SESSION_HEADER, &session)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ack.status(), StatusCode::ACCEPTED);

    session
}

// =============================================================================
// Endpoints
// =============================================================================

#[tokio::test]
async fn test_health() {
    let transport = start().await;
    let body = reqwest::get(format!("http://{}/health", transport.addr()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_session_flow() {
    let transport = start().await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    let response = client
        .post(&url)
        .header(SESSION_HEADER, &session)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "render_markdown", "arguments": { "markdown": "# Hello" } }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], 2);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("<h1>Hello</h1>"));
}

#[tokio::test]
async fn test_tools_list_over_http() {
    let transport = start().await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    let body: Value = client
        .post(&url)
        .header(SESSION_HEADER, &session)
        .json(&json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_unknown_tool_over_http() {
    let transport = start().await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    let body: Value = client
        .post(&url)
        .header(SESSION_HEADER, &session)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "nonexistent", "arguments": {} }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["error"]["code"], -32602);
}

// =============================================================================
// Session Errors
// =============================================================================

#[tokio::test]
async fn test_missing_session_header() {
    let transport = start().await;
    let response = reqwest::Client::new()
        .post(mcp_url(&transport))
        .json(&json!({"jsonrpc": "2.0", "id": 5, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 5);
}

#[tokio::test]
async fn test_unknown_session() {
    let transport = start().await;
    let response = reqwest::Client::new()
        .post(mcp_url(&transport))
        .header(SESSION_HEADER, "no-such-session")
        .json(&json!({"jsonrpc": "2.0", "id": 6, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body() {
    let transport = start().await;
    let response = reqwest::Client::new()
        .post(mcp_url(&transport))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_failed_initialize_creates_no_session() {
    let transport = start().await;
    let response = reqwest::Client::new()
        .post(mcp_url(&transport))
        .json(&json!({"jsonrpc": "2.0", "id": 7, "method": "initialize"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SESSION_HEADER).is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_delete_session() {
    let transport = start().await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    let deleted = client
        .delete(&url)
        .header(SESSION_HEADER, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let again = client
        .delete(&url)
        .header(SESSION_HEADER, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let after = client
        .post(&url)
        .header(SESSION_HEADER, &session)
        .json(&json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let mut transport = start().await;
    let addr = transport.addr();
    transport.shutdown();
    transport.wait().await.unwrap();

    let result = reqwest::get(format!("http://{addr}/health")).await;
    assert!(result.is_err());
}

// =============================================================================
// Concurrency
// =============================================================================

async fn post(client: &reqwest::Client, url: &str, session: &str, body: Value) -> StatusCode {
    client
        .post(url)
        .header(SESSION_HEADER, session)
        .json(&body)
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_initialised_state() {
    let transport = start().await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();

    for round in 0..50 {
        let session = initialize(&client, &url).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let (client, url, session) = (client.clone(), url.clone(), session.clone());
            tasks.push(tokio::spawn(async move {
                let ping = json!({"jsonrpc": "2.0", "id": 100 + i, "method": "ping"});
                post(&client, &url, &session, ping).await
            }));
        }
        let ack = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert_eq!(post(&client, &url, &session, ack).await, StatusCode::ACCEPTED);
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }

        let body: Value = client
            .post(&url)
            .header(SESSION_HEADER, &session)
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(
            body.get("result").is_some(),
            "session stuck after acknowledged initialisation in round {round}: {body}"
        );
    }
}

// =============================================================================
// Limits
// =============================================================================

fn render_call(markdown: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 10,
        "method": "tools/call",
        "params": { "name": "render_markdown", "arguments": { "markdown": markdown } }
    })
}

#[tokio::test]
async fn test_large_input_within_configured_limit() {
    let convert = ConvertOptions::default().max_input_bytes(8 * MIB);
    let transport = start_with(convert, HttpOptions::for_input_limit(8 * MIB)).await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    let response = client
        .post(&url)
        .header(SESSION_HEADER, &session)
        .json(&render_call("a".repeat(3 * MIB)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["isError"], Value::Null);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("<p>aaa"));
}

#[tokio::test]
async fn test_oversized_input_is_a_tool_error() {
    let transport = start().await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    let response = client
        .post(&url)
        .header(SESSION_HEADER, &session)
        .json(&render_call("a".repeat(MIB + MIB / 2)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["isError"], true);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("too large"));
}

#[tokio::test]
async fn test_session_cap_evicts_least_recently_used() {
    let transport = start_with(
        ConvertOptions::default(),
        HttpOptions::default().max_sessions(2),
    )
    .await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();

    let first = open_session(&client, &url).await;
    let second = open_session(&client, &url).await;
    let ping = json!({"jsonrpc": "2.0", "id": 11, "method": "ping"});
    assert_eq!(post(&client, &url, &first, ping.clone()).await, StatusCode::OK);

    let third = open_session(&client, &url).await;
    assert_eq!(post(&client, &url, &second, ping.clone()).await, StatusCode::NOT_FOUND);
    assert_eq!(post(&client, &url, &first, ping.clone()).await, StatusCode::OK);
    assert_eq!(post(&client, &url, &third, ping).await, StatusCode::OK);
}

#[tokio::test]
async fn test_idle_session_expires() {
    let transport = start_with(
        ConvertOptions::default(),
        HttpOptions::default().session_idle_timeout(Duration::from_millis(500)),
    )
    .await;
    let url = mcp_url(&transport);
    let client = reqwest::Client::new();
    let session = open_session(&client, &url).await;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let ping = json!({"jsonrpc": "2.0", "id": 12, "method": "ping"});
    assert_eq!(post(&client, &url, &session, ping).await, StatusCode::NOT_FOUND);
}
