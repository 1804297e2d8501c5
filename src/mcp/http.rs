//! Streamable HTTP transport for MCP server.
//!
//! Every JSON-RPC message is one `POST /mcp`. Sessions are tracked by the
//! `Mcp-Session-Id` header:
//!
//! - `initialize` creates a session and returns its ID in the header
//! - every later request must carry that header (missing: 400, unknown: 404)
//! - notifications are acknowledged with `202 Accepted` and no body
//! - `DELETE /mcp` ends the session
//!
//! Sessions idle for longer than [`HttpOptions::session_idle_timeout`] are
//! dropped, and once [`HttpOptions::max_sessions`] are open the least
//! recently used one makes room for a new `initialize`.
//!
//! `GET /health` answers `ok` for liveness probes.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, OutgoingMessage, RequestId,
};
use crate::mcp::server::{McpServer, Session};
use crate::mcp::transport::shutdown_signal;
use crate::render::DEFAULT_MAX_INPUT_BYTES;

/// Header carrying the session ID.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Default idle time after which a session is dropped (30 minutes).
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default number of concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

// Room for the JSON-RPC envelope around the Markdown argument.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Request body size needed to carry `max_input_bytes` of Markdown.
///
/// Allows for JSON string escaping doubling the input.
#[must_use]
pub const fn body_limit_for_input(max_input_bytes: usize) -> usize {
    max_input_bytes.saturating_mul(2).saturating_add(BODY_OVERHEAD_BYTES)
}

/// Limits applied by the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    max_body_bytes: usize,
    session_idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self::for_input_limit(DEFAULT_MAX_INPUT_BYTES)
    }
}

impl HttpOptions {
    /// Options whose body limit admits `max_input_bytes` of Markdown.
    #[must_use]
    pub const fn for_input_limit(max_input_bytes: usize) -> Self {
        Self {
            max_body_bytes: body_limit_for_input(max_input_bytes),
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Sets the idle time after which a session is dropped.
    #[must_use]
    pub const fn session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    /// Sets the number of sessions kept open at once. Zero is treated as one.
    #[must_use]
    pub const fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = if max == 0 { 1 } else { max };
        self
    }

    /// Largest accepted request body in bytes.
    #[must_use]
    pub const fn body_limit(&self) -> usize {
        self.max_body_bytes
    }
}

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

/// Open sessions by ID.
///
/// Each session has its own lock, held while one of its messages is
/// handled, so concurrent requests on a session apply in turn.
struct SessionStore {
    slots: HashMap<String, SessionSlot>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    fn new(options: &HttpOptions) -> Self {
        Self {
            slots: HashMap::new(),
            idle_timeout: options.session_idle_timeout,
            max_sessions: options.max_sessions,
        }
    }

    fn insert(&mut self, id: String, session: Session, now: Instant) {
        self.expire(now);

        while self.slots.len() >= self.max_sessions {
            let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_seen)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.slots.remove(&oldest);
            warn!(
                session = %oldest,
                "Session limit reached, dropping least recently used session"
            );
        }

        self.slots.insert(
            id,
            SessionSlot {
                session: Arc::new(Mutex::new(session)),
                last_seen: now,
            },
        );
    }

    /// Looks up a live session and marks it used at `now`.
    fn touch(&mut self, id: &str, now: Instant) -> Option<Arc<Mutex<Session>>> {
        let slot = self.slots.get_mut(id)?;
        if now.saturating_duration_since(slot.last_seen) > self.idle_timeout {
            self.slots.remove(id);
            info!(session = id, "Session expired");
            return None;
        }
        slot.last_seen = now;
        Some(Arc::clone(&slot.session))
    }

    fn remove(&mut self, id: &str) -> bool {
        self.slots.remove(id).is_some()
    }

    fn expire(&mut self, now: Instant) {
        let timeout = self.idle_timeout;
        let before = self.slots.len();
        self.slots.retain(|_, slot| now.saturating_duration_since(slot.last_seen) <= timeout);
        let expired = before - self.slots.len();
        if expired > 0 {
            info!(expired, "Dropped idle sessions");
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

struct AppState {
    server: McpServer,
    sessions: Mutex<SessionStore>,
}

/// Builds the MCP router around `server`.
pub fn router(server: McpServer, options: HttpOptions) -> Router {
    let state = Arc::new(AppState {
        server,
        sessions: Mutex::new(SessionStore::new(&options)),
    });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    Router::new()
        .route("/mcp", post(handle_post).delete(handle_delete))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

fn reply(status: StatusCode, message: &OutgoingMessage) -> Response {
    (status, Json(message)).into_response()
}

fn session_error(status: StatusCode, id: Option<RequestId>, message: &str) -> Response {
    reply(status, &JsonRpcError::invalid_request(id, message).into())
}

async fn handle_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let message = match parse_message(&body) {
        Ok(message) => message,
        Err(error) => return reply(StatusCode::BAD_REQUEST, &error.into()),
    };

    if matches!(&message, IncomingMessage::Request(req) if req.method == "initialize") {
        return initialize(&state, message).await;
    }

    let request_id = message.id().cloned();
    let Some(id) = session_id(&headers) else {
        return session_error(
            StatusCode::BAD_REQUEST,
            request_id,
            "Missing Mcp-Session-Id header",
        );
    };

    let Some(session) = state.sessions.lock().await.touch(id, Instant::now()) else {
        debug!(session = id, "Request for unknown session");
        return session_error(StatusCode::NOT_FOUND, request_id, "Unknown session");
    };

    let outgoing = {
        let mut session = session.lock().await;
        state.server.handle_message(&mut session, message)
    };

    match outgoing {
        Some(message) => reply(StatusCode::OK, &message),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn initialize(state: &AppState, message: IncomingMessage) -> Response {
    let mut session = Session::new();
    let Some(outgoing) = state.server.handle_message(&mut session, message) else {
        return StatusCode::ACCEPTED.into_response();
    };

    if outgoing.is_error() {
        return reply(StatusCode::OK, &outgoing);
    }

    let id = Uuid::new_v4().to_string();
    let open = {
        let mut sessions = state.sessions.lock().await;
        sessions.insert(id.clone(), session, Instant::now());
        sessions.len()
    };
    info!(session = %id, open, "Session created");

    (
        StatusCode::OK,
        [(HeaderName::from_static(SESSION_HEADER), id)],
        Json(outgoing),
    )
        .into_response()
}

async fn handle_delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(id) = session_id(&headers) else {
        return session_error(StatusCode::BAD_REQUEST, None, "Missing Mcp-Session-Id header");
    };

    if state.sessions.lock().await.remove(id) {
        info!(session = id, "Session terminated");
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// A running HTTP transport.
///
/// Dropping it stops the listener.
pub struct HttpTransport {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<io::Result<()>>>,
}

impl HttpTransport {
    /// Binds `addr` and starts serving `server` in the background.
    ///
    /// Bind to port 0 to let the OS pick a free port; [`Self::addr`] reports
    /// the actual address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        server: McpServer,
        options: HttpOptions,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let app = router(server, options);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(%addr, "HTTP transport listening");

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// The address the listener is bound to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Asks the listener to stop accepting connections.
    pub fn shutdown(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            if sender.send(()).is_err() {
                debug!("HTTP transport already stopped");
            }
        }
    }

    /// Waits for the listener to finish after [`Self::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns an error if the server failed or its task panicked.
    pub async fn wait(mut self) -> io::Result<()> {
        match self.task.take() {
            Some(task) => task.await.map_err(io::Error::other)?,
            None => Ok(()),
        }
    }

    /// Serves until a shutdown signal arrives, then stops gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails or signal handlers cannot be
    /// installed.
    pub async fn run(mut self) -> io::Result<()> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        tokio::select! {
            result = &mut task => {
                warn!("HTTP transport stopped unexpectedly");
                return result.map_err(io::Error::other)?;
            }
            signal = shutdown_signal() => {
                info!(signal = signal?, "Received shutdown signal, stopping HTTP transport");
            }
        }

        self.shutdown();
        task.await.map_err(io::Error::other)?
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
