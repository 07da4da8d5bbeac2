//! WebSocket relay for clients that cannot hold an SSE connection.
//!
//! Runs on its own listener so the relay can be exposed separately from the
//! REST surface. Browsers cannot set an Authorization header on a socket
//! upgrade, so the JWT is taken from the `token` query parameter instead.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::notifications::NotificationHub;

#[derive(Clone)]
pub struct RelayState {
    pub hub: Arc<NotificationHub>,
    pub auth: Arc<AuthService>,
}

#[derive(Debug, Deserialize)]
struct RelayQuery {
    token: String,
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .with_state(state)
}

/// Bind the relay listener and serve until the process shuts down.
pub async fn serve(state: RelayState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Notification relay listening on {}", addr);
    axum::serve(listener, relay_router(state)).await?;
    Ok(())
}

async fn ws_upgrade_handler(
    State(state): State<RelayState>,
    Query(query): Query<RelayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let claims = match state.auth.validate_token(&query.token).await {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };
    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return crate::auth::AuthError::InvalidToken.into_response(),
    };

    ws.on_upgrade(move |socket| relay_session(socket, state, user_id))
}

async fn relay_session(mut socket: WebSocket, state: RelayState, user_id: Uuid) {
    let mut rx = state.hub.subscribe(user_id);
    debug!(user_id = %user_id, "relay session opened");

    loop {
        tokio::select! {
            payload = rx.recv() => match payload {
                Ok(payload) => {
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "relay client lagged, messages dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                // The relay is one-way; client text frames are ignored.
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    debug!(user_id = %user_id, "relay session closed");
    state.hub.sweep();
}
