// Public API - what other modules can use
pub use handlers::{
    deliver_amenity, list_amenity_requests, list_tickets, live_status, mark_room_clean,
    report_issue, request_amenity, resolve_ticket, update_room_status,
};
pub use models::{
    AmenityRequestModel, AmenityStatus, MaintenanceTicketModel, RoomState, RoomStatus,
    TicketPriority, TicketStatus,
};
pub use repository::{
    HousekeepingRepository, InMemoryHousekeepingRepository, PostgresHousekeepingRepository,
};
pub use service::HousekeepingService;

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
mod service;
mod types;
