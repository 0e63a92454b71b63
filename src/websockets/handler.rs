use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use tracing::{info, instrument, warn};

use super::socket::ClientSession;
use crate::shared::AppState;

/// WebSocket endpoint for the housekeeping live map
///
/// GET /ws
/// Terminals authenticate upstream; this layer only upgrades the connection.
#[instrument(name = "websocket_handler", skip(ws, app_state))]
pub async fn websocket_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    info!("Staff terminal WebSocket connection requested");

    ws.on_upgrade(move |socket| handle_websocket_connection(socket, app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, app_state: AppState) {
    let mut session = ClientSession::new(
        Box::new(socket),
        app_state.hub.clone(),
        app_state.session_config.clone(),
    );

    info!(session_id = %session.id(), "WebSocket connection established");

    // Run the session until disconnect or eviction
    match session.run().await {
        Ok(exit) => {
            info!(
                session_id = %session.id(),
                exit = ?exit,
                "WebSocket connection closed cleanly"
            );
        }
        Err(e) => {
            warn!(
                session_id = %session.id(),
                error = %e,
                "WebSocket connection error"
            );
        }
    }
}
