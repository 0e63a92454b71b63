use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::errors::SettlementError;
use super::models::{
    BillingState, ChargeLine, GuestStay, InvoiceDraft, InvoiceModel, InvoicePreview,
};
use super::repository::{ChargeLedger, GuestDirectory, SettlementUnitOfWork};
use crate::housekeeping::{HousekeepingService, RoomStatus};

pub const DEFAULT_PAYMENT_METHOD: &str = "CREDIT_CARD";

/// Whole elapsed days between check-in and check-out, never less than 1
pub fn stay_days(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    (check_out - check_in).num_days().max(1)
}

/// Aggregates a guest's bill and settles it in one atomic write
pub struct SettlementEngine {
    guests: Arc<dyn GuestDirectory>,
    laundry: Arc<dyn ChargeLedger>,
    restaurant: Arc<dyn ChargeLedger>,
    unit_of_work: Arc<dyn SettlementUnitOfWork>,
    housekeeping: Option<Arc<HousekeepingService>>,
    payment_method: String,
}

/// Bill as computed from the current ledgers
struct Bill {
    guest: GuestStay,
    preview: InvoicePreview,
    laundry_lines: u64,
    restaurant_lines: u64,
}

fn total(lines: &[ChargeLine]) -> Decimal {
    lines.iter().map(|line| line.amount).sum()
}

impl SettlementEngine {
    pub fn new(
        guests: Arc<dyn GuestDirectory>,
        laundry: Arc<dyn ChargeLedger>,
        restaurant: Arc<dyn ChargeLedger>,
        unit_of_work: Arc<dyn SettlementUnitOfWork>,
    ) -> Self {
        Self {
            guests,
            laundry,
            restaurant,
            unit_of_work,
            housekeeping: None,
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
        }
    }

    /// Marks the room DIRTY through housekeeping after each checkout
    pub fn with_housekeeping(mut self, housekeeping: Arc<HousekeepingService>) -> Self {
        self.housekeeping = Some(housekeeping);
        self
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = payment_method.into();
        self
    }

    #[instrument(skip(self))]
    pub async fn generate_preview(&self, guest_id: i32) -> Result<InvoicePreview, SettlementError> {
        let guest = self.guest_by_id(guest_id).await?;
        Ok(self.compute_bill(guest).await?.preview)
    }

    #[instrument(skip(self))]
    pub async fn generate_preview_by_room(
        &self,
        room_number: &str,
    ) -> Result<InvoicePreview, SettlementError> {
        let guest = self.guest_by_room(room_number).await?;
        Ok(self.compute_bill(guest).await?.preview)
    }

    #[instrument(skip(self))]
    pub async fn process_checkout(&self, guest_id: i32) -> Result<InvoiceModel, SettlementError> {
        let guest = self.guest_by_id(guest_id).await?;
        self.checkout(guest).await
    }

    #[instrument(skip(self))]
    pub async fn process_checkout_by_room(
        &self,
        room_number: &str,
    ) -> Result<InvoiceModel, SettlementError> {
        let guest = self.guest_by_room(room_number).await?;
        self.checkout(guest).await
    }

    async fn guest_by_id(&self, guest_id: i32) -> Result<GuestStay, SettlementError> {
        self.guests.find_guest(guest_id).await?.ok_or_else(|| {
            debug!(guest_id = guest_id, "Guest not found");
            SettlementError::GuestNotFound(format!("guest {}", guest_id))
        })
    }

    async fn guest_by_room(&self, room_number: &str) -> Result<GuestStay, SettlementError> {
        self.guests
            .latest_guest_in_room(room_number)
            .await?
            .ok_or_else(|| {
                debug!(room_number = %room_number, "No guest registered for room");
                SettlementError::GuestNotFound(format!("no guest in room {}", room_number))
            })
    }

    async fn compute_bill(&self, guest: GuestStay) -> Result<Bill, SettlementError> {
        let laundry = self.laundry.unpaid_charges(guest.guest_id).await?;
        let restaurant = self.restaurant.unpaid_charges(guest.guest_id).await?;

        let days = stay_days(guest.check_in, guest.check_out);
        let room_total = Decimal::from(days) * guest.nightly_rate;
        let laundry_total = total(&laundry);
        let restaurant_total = total(&restaurant);

        debug!(
            guest_id = guest.guest_id,
            stay_days = days,
            laundry_source = %self.laundry.source(),
            laundry_lines = laundry.len(),
            restaurant_source = %self.restaurant.source(),
            restaurant_lines = restaurant.len(),
            "Bill computed"
        );

        Ok(Bill {
            preview: InvoicePreview {
                guest_name: guest.name.clone(),
                stay_days: days,
                room_total,
                laundry_total,
                restaurant_total,
                grand_total: room_total + laundry_total + restaurant_total,
            },
            laundry_lines: laundry.len() as u64,
            restaurant_lines: restaurant.len() as u64,
            guest,
        })
    }

    async fn checkout(&self, guest: GuestStay) -> Result<InvoiceModel, SettlementError> {
        let billing = BillingState::from(guest.status);
        if !billing.can_transition_to(BillingState::CheckoutRequested) {
            info!(guest_id = guest.guest_id, billing = %billing, "Checkout refused, stay already settled");
            return Err(SettlementError::AlreadySettled(guest.guest_id));
        }
        let billing = BillingState::CheckoutRequested;

        let bill = self.compute_bill(guest).await?;
        let draft = InvoiceDraft {
            guest_id: bill.guest.guest_id,
            room_number: bill.guest.room_number.clone(),
            room_total: bill.preview.room_total,
            laundry_total: bill.preview.laundry_total,
            restaurant_total: bill.preview.restaurant_total,
            grand_total: bill.preview.grand_total,
            payment_method: self.payment_method.clone(),
            laundry_lines: bill.laundry_lines,
            restaurant_lines: bill.restaurant_lines,
        };

        let invoice = self.unit_of_work.settle(&draft).await.map_err(|e| {
            warn!(guest_id = draft.guest_id, billing = %billing, error = %e, "Checkout did not commit");
            e
        })?;

        info!(
            guest_id = invoice.guest_id,
            invoice_id = invoice.id,
            total = %invoice.total_amount,
            billing = %BillingState::Settled,
            "Guest checked out"
        );

        if let Some(housekeeping) = &self.housekeeping {
            if let Err(e) = housekeeping
                .update_room_status(&invoice.room_number, RoomStatus::Dirty)
                .await
            {
                warn!(
                    room_number = %invoice.room_number,
                    error = %e,
                    "Checkout committed but room could not be marked dirty"
                );
            }
        }

        Ok(invoice)
    }
}
