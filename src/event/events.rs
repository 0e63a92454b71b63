use serde::{Deserialize, Serialize};

use crate::housekeeping::models::{AmenityRequestModel, MaintenanceTicketModel, RoomStatus};

/// Notifications pushed to staff terminals
///
/// Events represent facts about things that have already been persisted.
/// On the wire each one is `{ "type": ..., "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventEnvelope {
    /// A room's housekeeping status changed
    RoomUpdate(RoomUpdatePayload),

    /// A guest asked for an amenity
    NewTask(AmenityRequestModel),

    /// A maintenance issue was reported
    NewTicket(MaintenanceTicketModel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomUpdatePayload {
    pub room_number: String,
    pub status: RoomStatus,
}

impl EventEnvelope {
    pub fn room_update(room_number: impl Into<String>, status: RoomStatus) -> Self {
        EventEnvelope::RoomUpdate(RoomUpdatePayload {
            room_number: room_number.into(),
            status,
        })
    }

    /// Wire name of the event kind
    pub fn event_type(&self) -> &'static str {
        match self {
            EventEnvelope::RoomUpdate(_) => "ROOM_UPDATE",
            EventEnvelope::NewTask(_) => "NEW_TASK",
            EventEnvelope::NewTicket(_) => "NEW_TICKET",
        }
    }

    /// Room the event concerns
    pub fn room_number(&self) -> &str {
        match self {
            EventEnvelope::RoomUpdate(payload) => &payload.room_number,
            EventEnvelope::NewTask(request) => &request.room_number,
            EventEnvelope::NewTicket(ticket) => &ticket.room_number,
        }
    }
}
