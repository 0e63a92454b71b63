use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use tracing::{info, instrument, warn};

use super::{
    models::{InvoiceModel, InvoicePreview},
    types::{SettlementQuery, SettlementTarget},
};
use crate::shared::{AppError, AppState};

/// Staff address a bill by room; guests by their bearer token
fn resolve_target(
    state: &AppState,
    query: &SettlementQuery,
    headers: &HeaderMap,
) -> Result<SettlementTarget, AppError> {
    match query.room.as_deref() {
        Some(room) if !room.is_empty() => {
            let room = room.trim();
            if room.is_empty() {
                warn!("Rejected settlement request with a blank room");
                return Err(AppError::Validation("room must not be blank".to_string()));
            }
            Ok(SettlementTarget::Room(room.to_string()))
        }
        _ => Ok(SettlementTarget::Guest(
            state.token_config.guest_id_from_headers(headers)?,
        )),
    }
}

/// GET /invoice/preview[?room=]
#[instrument(name = "invoice_preview", skip(state, headers))]
pub async fn preview_invoice(
    State(state): State<AppState>,
    Query(query): Query<SettlementQuery>,
    headers: HeaderMap,
) -> Result<Json<InvoicePreview>, AppError> {
    let target = resolve_target(&state, &query, &headers)?;
    let engine = &state.settlement_engine;

    let preview = match &target {
        SettlementTarget::Room(room) => engine.generate_preview_by_room(room).await?,
        SettlementTarget::Guest(guest_id) => engine.generate_preview(*guest_id).await?,
    };

    info!(target = ?target, grand_total = %preview.grand_total, "Invoice preview generated");
    Ok(Json(preview))
}

/// POST /invoice/checkout[?room=]
#[instrument(name = "invoice_checkout", skip(state, headers))]
pub async fn checkout(
    State(state): State<AppState>,
    Query(query): Query<SettlementQuery>,
    headers: HeaderMap,
) -> Result<Json<InvoiceModel>, AppError> {
    let target = resolve_target(&state, &query, &headers)?;
    let engine = &state.settlement_engine;

    let invoice = match &target {
        SettlementTarget::Room(room) => engine.process_checkout_by_room(room).await?,
        SettlementTarget::Guest(guest_id) => engine.process_checkout(*guest_id).await?,
    };

    info!(target = ?target, invoice_id = invoice.id, "Checkout completed");
    Ok(Json(invoice))
}
