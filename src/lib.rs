// Library crate for the Oasis hotel back office
// This file exposes the public API for the binary and integration tests

pub mod auth;
pub mod config;
pub mod event;
pub mod housekeeping;
pub mod routes;
pub mod settlement;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::AppConfig;
pub use event::{EventEnvelope, Hub, HubConfig, HubHandle, PublishOutcome};
pub use housekeeping::{HousekeepingService, RoomStatus};
pub use routes::build_router;
pub use settlement::{SettlementEngine, SettlementError};
pub use shared::{AppError, AppState};
pub use websockets::{ClientSession, SessionConfig, SessionExit, SocketWrapper};
