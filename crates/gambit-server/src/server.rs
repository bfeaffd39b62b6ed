//! The WebSocket edge.
//!
//! Thin by design: authenticate the upgrade, then shuttle frames. Inbound
//! text becomes [`ServerEvent::Inbound`]; a per-connection writer task
//! drains the outbound channel the coordinator sends on. All decisions live
//! in the coordinator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use gambit_core::UserIdentity;

use crate::auth::Authenticator;
use crate::connection::ConnId;
use crate::coordinator::ServerEvent;
use crate::protocol::{ClientMessage, ServerMessage};

/// Shared state for the axum handlers.
#[derive(Clone)]
pub struct AppState {
    events: mpsc::UnboundedSender<ServerEvent>,
    auth: Arc<dyn Authenticator>,
    next_conn: Arc<AtomicU64>,
}

impl AppState {
    /// Wire the edge to the coordinator's mailbox and an authenticator.
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<ServerEvent>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            events,
            auth,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// Build the HTTP router: a health probe and the WebSocket endpoint.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(WsQuery { token }): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = token.unwrap_or_default();
    match state.auth.resolve_user(&token).await {
        Ok(user) => ws
            .on_upgrade(move |socket| handle_socket(state, user, socket))
            .into_response(),
        Err(err) => {
            warn!(%err, "connection refused");
            (StatusCode::UNAUTHORIZED, err.to_string()).into_response()
        }
    }
}

async fn handle_socket(state: AppState, user: UserIdentity, socket: WebSocket) {
    let conn = ConnId::new(state.next_conn.fetch_add(1, Ordering::Relaxed));
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    if state
        .events
        .send(ServerEvent::Connected {
            conn,
            user,
            outbound: outbound.clone(),
        })
        .is_err()
    {
        return;
    }

    // Forward coordinator messages onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    error!(%err, "failed to encode outbound message");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Read frames until the peer goes away.
    while let Some(Ok(frame)) = ws_rx.next().await {
        match frame {
            Message::Text(text) => match ClientMessage::parse(&text) {
                Ok(message) => {
                    if state
                        .events
                        .send(ServerEvent::Inbound { conn, message })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    // Malformed frames are logged and answered with an
                    // alert; the connection stays up.
                    debug!(%conn, %err, "dropping malformed frame");
                    let _ = outbound.send(ServerMessage::GameAlert {
                        message: err.to_string(),
                    });
                }
            },
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let _ = state.events.send(ServerEvent::Disconnected { conn });
    writer.abort();
}
