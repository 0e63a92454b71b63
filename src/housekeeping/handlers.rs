use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::str::FromStr;
use tracing::{info, instrument};

use super::{
    models::{AmenityRequestModel, MaintenanceTicketModel, RoomState, RoomStatus},
    types::{AmenityRequestBody, RoomStatusRequest, TicketRequestBody},
};
use crate::shared::{AppError, AppState};

/// Full-state pull of the live map
///
/// GET /housekeeping/live
#[instrument(name = "live_status", skip(state))]
pub async fn live_status(State(state): State<AppState>) -> Result<Json<Vec<RoomState>>, AppError> {
    let rooms = state.housekeeping_service.live_status().await?;
    info!(room_count = rooms.len(), "Live status served");
    Ok(Json(rooms))
}

/// POST /housekeeping/clean
#[instrument(name = "update_room_status", skip(state))]
pub async fn update_room_status(
    State(state): State<AppState>,
    Json(request): Json<RoomStatusRequest>,
) -> Result<Json<RoomState>, AppError> {
    let status = match request.status.as_deref() {
        None => RoomStatus::RequestedCleaning,
        Some(raw) => RoomStatus::from_str(raw)
            .map_err(|_| AppError::Validation(format!("Unknown room status: {}", raw)))?,
    };

    let room = state
        .housekeeping_service
        .update_room_status(&request.room_number, status)
        .await?;
    Ok(Json(room))
}

/// PATCH /housekeeping/rooms/:room/clean
#[instrument(name = "mark_room_clean", skip(state))]
pub async fn mark_room_clean(
    State(state): State<AppState>,
    Path(room_number): Path<String>,
) -> Result<Json<RoomState>, AppError> {
    let room = state.housekeeping_service.mark_clean(&room_number).await?;
    Ok(Json(room))
}

/// POST /housekeeping/amenity
#[instrument(name = "request_amenity", skip(state))]
pub async fn request_amenity(
    State(state): State<AppState>,
    Json(request): Json<AmenityRequestBody>,
) -> Result<(StatusCode, Json<AmenityRequestModel>), AppError> {
    let stored = state
        .housekeeping_service
        .request_amenity(
            request.guest_id,
            &request.room_number,
            &request.amenity,
            request.quantity,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /housekeeping/ticket
#[instrument(name = "report_issue", skip(state))]
pub async fn report_issue(
    State(state): State<AppState>,
    Json(request): Json<TicketRequestBody>,
) -> Result<(StatusCode, Json<MaintenanceTicketModel>), AppError> {
    let ticket = state
        .housekeeping_service
        .report_issue(&request.room_number, &request.issue_type, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /housekeeping/amenities
#[instrument(name = "list_amenity_requests", skip(state))]
pub async fn list_amenity_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<AmenityRequestModel>>, AppError> {
    Ok(Json(state.housekeeping_service.amenity_requests().await?))
}

/// GET /housekeeping/tickets
#[instrument(name = "list_tickets", skip(state))]
pub async fn list_tickets(
    State(state): State<AppState>,
) -> Result<Json<Vec<MaintenanceTicketModel>>, AppError> {
    Ok(Json(state.housekeeping_service.maintenance_tickets().await?))
}

/// PATCH /housekeeping/amenities/:id/deliver
#[instrument(name = "deliver_amenity", skip(state))]
pub async fn deliver_amenity(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AmenityRequestModel>, AppError> {
    Ok(Json(
        state.housekeeping_service.mark_amenity_delivered(id).await?,
    ))
}

/// PATCH /housekeeping/tickets/:id/resolve
#[instrument(name = "resolve_ticket", skip(state))]
pub async fn resolve_ticket(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MaintenanceTicketModel>, AppError> {
    Ok(Json(state.housekeeping_service.resolve_ticket(id).await?))
}
