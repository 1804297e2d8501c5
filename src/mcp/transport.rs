//! stdio transport for MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! The transport is generic over its reader and writer so the same loop can
//! be driven from in-memory buffers.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::protocol::OutgoingMessage;
use crate::mcp::server::{McpServer, Session, SessionState};

/// A stdio-based MCP transport.
///
/// Handles reading JSON-RPC messages from stdin and writing responses to stdout.
pub struct StdioTransport<R = BufReader<tokio::io::Stdin>, W = tokio::io::Stdout> {
    reader: R,
    writer: W,
}

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over arbitrary reader and writer halves.
    pub const fn with_io(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Returns the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Reads the next message line.
    ///
    /// Returns `None` if the input is closed (EOF).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes a JSON-RPC reply, terminated with a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_message(&mut self, message: &OutgoingMessage) -> io::Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // MCP spec: messages must not contain embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Serves one session until the input closes.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve(&mut self, server: &McpServer) -> io::Result<()> {
        let mut session = Session::new();

        while session.state() != SessionState::ShuttingDown {
            let Some(line) = self.read_line().await? else {
                debug!("Input closed");
                session.shut_down();
                break;
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Some(reply) = server.handle_line(&mut session, &line) {
                self.write_message(&reply).await?;
            }
        }

        Ok(())
    }

    /// Serves one session until the input closes or a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails or signal handlers cannot be
    /// installed.
    pub async fn run(&mut self, server: &McpServer) -> io::Result<()> {
        tokio::select! {
            result = self.serve(server) => result,
            signal = shutdown_signal() => {
                info!(signal = signal?, "Received shutdown signal, stopping stdio transport");
                Ok(())
            }
        }
    }
}

/// Resolves when SIGINT or SIGTERM arrives, naming the signal.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

/// Resolves when Ctrl+C is pressed.
///
/// # Errors
///
/// Returns an error if the handler cannot be installed.
#[cfg(windows)]
pub async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};
    use crate::render::ConvertOptions;
    use crate::tools::default_registry;

    fn server() -> McpServer {
        McpServer::new(default_registry(&ConvertOptions::default()).unwrap())
    }

    async fn run_script(input: &str) -> Vec<serde_json::Value> {
        let mut transport = StdioTransport::with_io(input.as_bytes(), Vec::new());
        transport.serve(&server()).await.unwrap();
        let (_, output) = transport.into_inner();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn transport_default() {
        let _transport = StdioTransport::default();
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mut transport = StdioTransport::with_io(&b"one\r\ntwo"[..], Vec::new());
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_message_is_one_line() {
        let mut transport = StdioTransport::with_io(&b""[..], Vec::new());
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({
                "message": "hello\nworld",
                "nested": {"key": "value"}
            }),
        );
        transport.write_message(&response.into()).await.unwrap();
        transport
            .write_message(&JsonRpcError::parse_error().into())
            .await
            .unwrap();

        let (_, output) = transport.into_inner();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.lines().count(), 2);
        assert!(output.ends_with('\n'));
    }

    #[tokio::test]
    async fn serve_full_session() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r##"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"convert_markdown","arguments":{"markdown":"# Title"}}}"##,
            "\n",
        );

        let replies = run_script(input).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(replies[1]["id"], 2);
        assert_eq!(replies[1]["result"]["content"][0]["text"], "h1. Title\n");
    }

    #[tokio::test]
    async fn serve_replies_to_garbage() {
        let replies = run_script("garbage\n").await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["error"]["code"], -32700);
    }
}
