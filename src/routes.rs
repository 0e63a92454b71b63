use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::housekeeping;
use crate::settlement;
use crate::shared::AppState;
use crate::websockets::websocket_handler;

/// Builds the HTTP and WebSocket surface of the back office
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/housekeeping/live", get(housekeeping::live_status))
        .route("/housekeeping/clean", post(housekeeping::update_room_status))
        .route(
            "/housekeeping/rooms/:room/clean",
            patch(housekeeping::mark_room_clean),
        )
        .route("/housekeeping/amenity", post(housekeeping::request_amenity))
        .route("/housekeeping/ticket", post(housekeeping::report_issue))
        .route(
            "/housekeeping/amenities",
            get(housekeeping::list_amenity_requests),
        )
        .route("/housekeeping/tickets", get(housekeeping::list_tickets))
        .route(
            "/housekeeping/amenities/:id/deliver",
            patch(housekeeping::deliver_amenity),
        )
        .route(
            "/housekeeping/tickets/:id/resolve",
            patch(housekeeping::resolve_ticket),
        )
        .route("/invoice/preview", get(settlement::preview_invoice))
        .route("/invoice/checkout", post(settlement::checkout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
