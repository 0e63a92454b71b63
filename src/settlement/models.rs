use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GuestStatus {
    CheckedIn,
    CheckedOut,
}

/// A guest's stay as seen by settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestStay {
    pub guest_id: i32,
    pub name: String,
    pub room_number: String,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub nightly_rate: Decimal,
    pub status: GuestStatus,
}

/// Subsystem a charge line originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeSource {
    Laundry,
    Restaurant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub source: ChargeSource,
    pub reference_id: i32,
    pub guest_id: i32,
    pub amount: Decimal,
    pub paid: bool,
}

/// Read-only bill summary, recomputed on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePreview {
    pub guest_name: String,
    pub stay_days: i64,
    pub room_total: Decimal,
    pub laundry_total: Decimal,
    pub restaurant_total: Decimal,
    pub grand_total: Decimal,
}

/// Everything the unit of work needs to settle one stay
///
/// The line counts let the transaction detect charges that landed after
/// the preview was computed.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub guest_id: i32,
    pub room_number: String,
    pub room_total: Decimal,
    pub laundry_total: Decimal,
    pub restaurant_total: Decimal,
    pub grand_total: Decimal,
    pub payment_method: String,
    pub laundry_lines: u64,
    pub restaurant_lines: u64,
}

/// Immutable settlement record, one per guest stay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceModel {
    pub id: i32,
    pub guest_id: i32,
    pub room_number: String,
    pub room_charge: Decimal,
    pub laundry_charge: Decimal,
    pub restaurant_charge: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

impl InvoiceModel {
    pub fn from_draft(id: i32, draft: &InvoiceDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            guest_id: draft.guest_id,
            room_number: draft.room_number.clone(),
            room_charge: draft.room_total,
            laundry_charge: draft.laundry_total,
            restaurant_charge: draft.restaurant_total,
            total_amount: draft.grand_total,
            payment_method: draft.payment_method.clone(),
            created_at,
        }
    }
}

/// Billing lifecycle of a stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingState {
    Active,
    CheckoutRequested,
    Settled,
}

impl BillingState {
    /// Forward-only transitions
    pub fn can_transition_to(&self, next: BillingState) -> bool {
        matches!(
            (self, next),
            (BillingState::Active, BillingState::CheckoutRequested)
                | (BillingState::CheckoutRequested, BillingState::Settled)
        )
    }
}

impl From<GuestStatus> for BillingState {
    fn from(status: GuestStatus) -> Self {
        match status {
            GuestStatus::CheckedIn => BillingState::Active,
            GuestStatus::CheckedOut => BillingState::Settled,
        }
    }
}
