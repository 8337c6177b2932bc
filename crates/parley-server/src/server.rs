//! HTTP surface and per-connection lifecycle.
//!
//! Two routes: `GET /ws` upgrades to the signaling WebSocket, `GET
//! /health` reports liveness counters. Each accepted socket gets a
//! reader loop, a writer task draining its outbound queue, and a
//! heartbeat watcher; whichever exits first tears the connection down
//! and runs the departure path exactly once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::health_check;
use crate::shutdown::ShutdownCoordinator;
use crate::ws::connection::{PeerConnection, PeerId};
use crate::ws::dispatcher::dispatch_frame;
use crate::ws::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::ws::registry::RoomRegistry;

/// Shared state handed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Room membership and fan-out.
    pub registry: Arc<RoomRegistry>,
    /// Shutdown coordinator; connections derive child tokens from it.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live WebSocket connection count.
    pub connections: Arc<AtomicUsize>,
    /// Process start, for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    /// Build fresh state from a config.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            config: Arc::new(config),
            connections: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Running server: bound address plus the serve task.
pub struct ServerHandle {
    /// Address the listener bound to.
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for the serve task to finish (after graceful shutdown).
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Bind and start serving. Returns once the listener is bound; the
/// accept loop runs in a spawned task until the shutdown token fires.
pub async fn listen(state: AppState) -> std::io::Result<ServerHandle> {
    let bind_addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let addr = listener.local_addr()?;

    let token = state.shutdown.token();
    let router = build_router(state);

    info!(%addr, "signaling relay listening");

    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await });
        if let Err(err) = serve.await {
            warn!(%err, "server exited with error");
        }
    });

    Ok(ServerHandle { addr, task })
}

/// WebSocket upgrade handler with a connection-count admission check.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.connections.load(Ordering::Relaxed) >= state.config.max_connections {
        warn!(
            max = state.config.max_connections,
            "rejecting connection, at capacity"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection from accept to departure.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let _ = state.connections.fetch_add(1, Ordering::Relaxed);

    let (tx, mut rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_depth);
    let conn = Arc::new(PeerConnection::new(PeerId::new(), tx));
    info!(peer = %conn.id, "peer connected");

    let cancel = state.shutdown.token().child_token();
    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let liveness_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);

    // Heartbeat cancels the connection token when the peer goes silent,
    // which unwinds both loops below.
    let hb_conn = Arc::clone(&conn);
    let hb_cancel = cancel.clone();
    let heartbeat = tokio::spawn(async move {
        let result =
            run_heartbeat(Arc::clone(&hb_conn), ping_interval, liveness_timeout, hb_cancel.clone())
                .await;
        if result == HeartbeatResult::TimedOut {
            warn!(peer = %hb_conn.id, "peer timed out, closing");
            hb_cancel.cancel();
        }
    });

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: drain the outbound queue, ping on the heartbeat interval.
    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        let _ = ping.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader: dispatch text frames, track liveness, stop on close.
    let reader_conn = Arc::clone(&conn);
    let reader_registry = Arc::clone(&state.registry);
    let reader_cancel = cancel.clone();
    let reader = tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        reader_conn.mark_alive();
                        let _ = dispatch_frame(&reader_registry, &reader_conn, text.as_str());
                    }
                    Some(Ok(Message::Pong(_))) => reader_conn.mark_alive(),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by axum; binary frames are not
                    // part of the protocol.
                    Some(Ok(_)) => {}
                },
                () = reader_cancel.cancelled() => break,
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }
    cancel.cancel();
    let _ = heartbeat.await;

    // Exactly one departure per connection, socket already torn down.
    if let Some(departure) = state.registry.leave(&conn.id) {
        info!(
            peer = %conn.id,
            room = departure.room,
            peers_notified = departure.peers_notified,
            room_closed = departure.room_closed,
            "peer left room"
        );
    }
    let _ = state.connections.fetch_sub(1, Ordering::Relaxed);
    info!(peer = %conn.id, age_secs = conn.age().as_secs(), "peer disconnected");
}

/// `GET /health`.
async fn health_handler(State(state): State<AppState>) -> Response {
    let body = health_check(
        state.start_time,
        state.connections.load(Ordering::Relaxed),
        state.registry.room_count(),
    );
    Json(body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(ServerConfig::default())
    }

    #[tokio::test]
    async fn health_route_responds() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["rooms"], 0);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // Plain GET without upgrade headers is rejected by the extractor
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let state = test_state();
        let shutdown = Arc::clone(&state.shutdown);
        let handle = listen(state).await.unwrap();
        assert_ne!(handle.addr.port(), 0);

        let url = format!("http://{}/health", handle.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        shutdown.shutdown();
        handle.finished().await;
    }

    #[tokio::test]
    async fn graceful_shutdown_stops_serving() {
        let state = test_state();
        let shutdown = Arc::clone(&state.shutdown);
        let handle = listen(state).await.unwrap();
        let addr = handle.addr;

        shutdown.shutdown();
        handle.finished().await;

        let result = reqwest::get(format!("http://{addr}/health")).await;
        assert!(result.is_err());
    }
}
