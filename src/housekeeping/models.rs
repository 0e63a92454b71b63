use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Housekeeping status of a room as shown on the live map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Clean,
    Dirty,
    RequestedCleaning,
    #[serde(rename = "DND")]
    #[strum(serialize = "DND")]
    DoNotDisturb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AmenityStatus {
    Pending,
    Delivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    Resolved,
}

/// Ticket priority; ordering follows urgency so `High > Normal > Low`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
}

/// One row of the live map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub room_number: String,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmenityRequestModel {
    pub id: i32,
    pub guest_id: i32,
    pub room_number: String,
    pub item_name: String,
    pub quantity: i32,
    pub status: AmenityStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTicketModel {
    pub id: i32,
    pub room_number: String,
    pub issue_type: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    #[serde(rename = "created_at")]
    pub reported_at: DateTime<Utc>,
}

/// Amenity request before the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewAmenityRequest {
    pub guest_id: i32,
    pub room_number: String,
    pub item_name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMaintenanceTicket {
    pub room_number: String,
    pub issue_type: String,
    pub description: String,
    pub priority: TicketPriority,
}
