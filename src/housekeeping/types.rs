use serde::{Deserialize, Serialize};

/// Request body for POST /housekeeping/clean
#[derive(Debug, Deserialize, Serialize)]
pub struct RoomStatusRequest {
    pub room_number: String,
    /// Defaults to REQUESTED_CLEANING when absent
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for POST /housekeeping/amenity
#[derive(Debug, Deserialize, Serialize)]
pub struct AmenityRequestBody {
    pub guest_id: i32,
    pub room_number: String,
    pub amenity: String,
    pub quantity: i32,
}

/// Request body for POST /housekeeping/ticket
#[derive(Debug, Deserialize, Serialize)]
pub struct TicketRequestBody {
    pub room_number: String,
    pub issue_type: String,
    #[serde(default)]
    pub description: String,
}
