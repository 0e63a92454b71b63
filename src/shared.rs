use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::TokenConfig;
use crate::event::HubHandle;
use crate::housekeeping::HousekeepingService;
use crate::settlement::SettlementEngine;
use crate::websockets::SessionConfig;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub housekeeping_service: Arc<HousekeepingService>,
    pub settlement_engine: Arc<SettlementEngine>,
    pub token_config: TokenConfig,
    pub session_config: SessionConfig,
}

impl AppState {
    pub fn new(
        hub: HubHandle,
        housekeeping_service: Arc<HousekeepingService>,
        settlement_engine: Arc<SettlementEngine>,
        token_config: TokenConfig,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            hub,
            housekeeping_service,
            settlement_engine,
            token_config,
            session_config,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::SettlementFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Checkout transaction failed: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::event::{Hub, HubConfig};
    use crate::housekeeping::repository::{HousekeepingRepository, InMemoryHousekeepingRepository};
    use crate::settlement::repository::InMemoryHotelStore;
    use crate::settlement::ChargeSource;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        housekeeping_repository: Option<Arc<dyn HousekeepingRepository>>,
        hotel_store: Option<Arc<InMemoryHotelStore>>,
        token_config: Option<TokenConfig>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                housekeeping_repository: None,
                hotel_store: None,
                token_config: None,
            }
        }

        pub fn with_housekeeping_repository(
            mut self,
            repo: Arc<dyn HousekeepingRepository>,
        ) -> Self {
            self.housekeeping_repository = Some(repo);
            self
        }

        pub fn with_hotel_store(mut self, store: Arc<InMemoryHotelStore>) -> Self {
            self.hotel_store = Some(store);
            self
        }

        pub fn with_token_config(mut self, token_config: TokenConfig) -> Self {
            self.token_config = Some(token_config);
            self
        }

        pub fn build(self) -> AppState {
            let (hub, _hub_task) = Hub::spawn(HubConfig::default());

            let housekeeping_repository = self
                .housekeeping_repository
                .unwrap_or_else(|| Arc::new(InMemoryHousekeepingRepository::new()));
            let housekeeping_service = Arc::new(HousekeepingService::new(
                housekeeping_repository,
                hub.clone(),
            ));

            let store = self
                .hotel_store
                .unwrap_or_else(|| Arc::new(InMemoryHotelStore::new()));
            let settlement_engine = Arc::new(
                SettlementEngine::new(
                    store.clone(),
                    InMemoryHotelStore::charge_ledger(&store, ChargeSource::Laundry),
                    InMemoryHotelStore::charge_ledger(&store, ChargeSource::Restaurant),
                    store,
                )
                .with_housekeeping(housekeeping_service.clone()),
            );

            AppState {
                hub,
                housekeeping_service,
                settlement_engine,
                token_config: self
                    .token_config
                    .unwrap_or_else(|| TokenConfig::with_secret("test-secret")),
                session_config: SessionConfig::default(),
            }
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
