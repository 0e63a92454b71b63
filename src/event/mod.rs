// Real-time notification infrastructure
//
// The hub owns the set of connected staff terminals and fans out events
// published by the housekeeping and settlement workflows.

// Public API - what other modules can use
pub use events::{EventEnvelope, RoomUpdatePayload};
pub use hub::{Hub, HubConfig, HubError, HubHandle, PublishOutcome, SessionId, SessionQueue};
pub use notify::write_then_notify;

// Internal modules
mod events;
mod hub;
mod notify;
