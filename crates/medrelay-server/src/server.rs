//! HTTP server: routing, `WebSocket` upgrade, and the listen loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use medrelay_store::StoreGateway;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::health::{HealthResponse, health_check};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{ConnectionRegistry, FanoutBroadcaster, session};

/// Shared state handed to every request handler and session task.
pub struct AppState {
    /// Live connection membership.
    pub registry: Arc<ConnectionRegistry>,
    /// Frame router.
    pub dispatcher: Dispatcher,
    /// Shutdown coordination.
    pub shutdown: ShutdownCoordinator,
    /// Effective configuration.
    pub config: Arc<ServerConfig>,
    /// When the server was constructed, for uptime reporting.
    pub start_time: Instant,
}

/// The relay server: wires the store, registry, broadcaster, and
/// dispatcher together and serves `/ws` and `/health`.
pub struct RelayServer {
    state: Arc<AppState>,
}

impl RelayServer {
    /// Assemble a server over the given store.
    pub fn new(config: ServerConfig, store: Arc<dyn StoreGateway>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(FanoutBroadcaster::new(registry.clone()));
        let dispatcher = Dispatcher::new(store, broadcaster);
        Self {
            state: Arc::new(AppState {
                registry,
                dispatcher,
                shutdown: ShutdownCoordinator::new(),
                config: Arc::new(config),
                start_time: Instant::now(),
            }),
        }
    }

    /// Build the router. Exposed separately so tests can drive it
    /// without binding a socket.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
    }

    /// Bind and start serving. Returns the bound address (relevant when
    /// the configured port is 0) and the listener task handle, which
    /// resolves once graceful shutdown completes.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind((
            self.state.config.host.as_str(),
            self.state.config.port,
        ))
        .await?;
        let addr = listener.local_addr()?;

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server exited with error");
            }
        });

        info!(%addr, "listening");
        Ok((addr, handle))
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.state.shutdown
    }

    /// The effective configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health_check(state.start_time, state.registry.len()))
}

async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    // Admission control happens before the upgrade so a saturated relay
    // answers with plain HTTP instead of accepting and dropping
    if state.registry.len() >= state.config.max_connections {
        warn!(
            peers = state.registry.len(),
            limit = state.config.max_connections,
            "connection limit reached, rejecting upgrade"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| session::run_session(socket, state))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use medrelay_store::SqliteStore;
    use tower::ServiceExt;

    fn make_server(config: ServerConfig) -> RelayServer {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        RelayServer::new(config, store)
    }

    #[tokio::test]
    async fn health_reports_ok_and_zero_connections() {
        let server = make_server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
    }

    #[tokio::test]
    async fn ws_upgrade_registers_peer() {
        let server = make_server(ServerConfig::default());
        let (addr, _handle) = server.listen().await.unwrap();

        let (_client, response) =
            tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
                .await
                .unwrap();
        assert_eq!(response.status().as_u16(), 101);

        // Registration happens on the spawned session task
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(server.registry().len(), 1);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let server = make_server(ServerConfig::default());
        let response = server
            .router()
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
    async fn listen_binds_and_shuts_down() {
        let server = make_server(ServerConfig::default());
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        handle.await.unwrap();
    }
}
