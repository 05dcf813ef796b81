use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use log::*;
use service::AppState;
use std::net::SocketAddr;

use super::connection::WebSocketConnection;

/// GET upgrade to a WebSocket subscribed to real-time campaign events
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching protocols; the connection now receives hub events"),
        (status = 400, description = "The request was not a valid WebSocket upgrade")
    )
)]
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(app_state): State<AppState>,
) -> Response {
    debug!("Upgrading WebSocket connection from {remote_addr}");

    ws.on_failed_upgrade(move |e| warn!("WebSocket upgrade from {remote_addr} failed: {e}"))
        .on_upgrade(move |socket| async move {
            let client_id = app_state
                .hub
                .register(WebSocketConnection::new(socket, remote_addr));
            debug!("WebSocket from {remote_addr} attached as client {client_id}");
        })
}
