use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::errors::SettlementError;
use super::models::{ChargeLine, ChargeSource, GuestStatus, GuestStay, InvoiceDraft, InvoiceModel};

/// Read access to guest stays
#[async_trait]
pub trait GuestDirectory: Send + Sync {
    async fn find_guest(&self, guest_id: i32) -> Result<Option<GuestStay>, SettlementError>;

    /// Most recently registered guest of a room, whatever their status
    async fn latest_guest_in_room(
        &self,
        room_number: &str,
    ) -> Result<Option<GuestStay>, SettlementError>;
}

/// Read access to one subsystem's unpaid charges
#[async_trait]
pub trait ChargeLedger: Send + Sync {
    fn source(&self) -> ChargeSource;

    async fn unpaid_charges(&self, guest_id: i32) -> Result<Vec<ChargeLine>, SettlementError>;
}

/// The single atomic write of a checkout
///
/// Implementations lock the guest, refuse an already checked-out stay, insert
/// the invoice, flip both ledgers to paid and check the guest out. Either all
/// of it commits or none of it does.
#[async_trait]
pub trait SettlementUnitOfWork: Send + Sync {
    async fn settle(&self, draft: &InvoiceDraft) -> Result<InvoiceModel, SettlementError>;
}

/// Steps of the checkout transaction, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SettlementStep {
    LockGuest,
    InsertInvoice,
    MarkLaundryPaid,
    MarkRestaurantPaid,
    MarkGuestCheckedOut,
}

impl SettlementStep {
    pub const ALL: [SettlementStep; 5] = [
        SettlementStep::LockGuest,
        SettlementStep::InsertInvoice,
        SettlementStep::MarkLaundryPaid,
        SettlementStep::MarkRestaurantPaid,
        SettlementStep::MarkGuestCheckedOut,
    ];
}

fn check_flipped(
    source: ChargeSource,
    flipped: u64,
    expected: u64,
) -> Result<(), SettlementError> {
    if flipped != expected {
        warn!(
            source = %source,
            flipped = flipped,
            expected = expected,
            "Charge lines changed since preview"
        );
        return Err(SettlementError::SettlementFailed(format!(
            "{} charges changed since preview ({} settled, {} expected)",
            source, flipped, expected
        )));
    }
    Ok(())
}

#[derive(Default, Clone)]
struct HotelTables {
    guests: BTreeMap<i32, GuestStay>,
    charges: Vec<ChargeLine>,
    invoices: Vec<InvoiceModel>,
    next_charge_id: i32,
    next_invoice_id: i32,
}

/// In-memory guest, ledger and invoice store for development and testing
///
/// Checkouts serialize on the store mutex and work on a copy of the tables;
/// the copy replaces the live tables only when every step succeeded.
pub struct InMemoryHotelStore {
    tables: Mutex<HotelTables>,
    injected_failure: Mutex<Option<SettlementStep>>,
}

impl Default for InMemoryHotelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHotelStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HotelTables::default()),
            injected_failure: Mutex::new(None),
        }
    }

    pub async fn add_guest(&self, guest: GuestStay) {
        let mut tables = self.tables.lock().await;
        tables.guests.insert(guest.guest_id, guest);
    }

    /// Records an unpaid charge and returns its reference id
    pub async fn add_charge(&self, source: ChargeSource, guest_id: i32, amount: Decimal) -> i32 {
        let mut tables = self.tables.lock().await;
        tables.next_charge_id += 1;
        let reference_id = tables.next_charge_id;
        tables.charges.push(ChargeLine {
            source,
            reference_id,
            guest_id,
            amount,
            paid: false,
        });
        reference_id
    }

    pub async fn invoices(&self) -> Vec<InvoiceModel> {
        self.tables.lock().await.invoices.clone()
    }

    pub async fn charges(&self) -> Vec<ChargeLine> {
        self.tables.lock().await.charges.clone()
    }

    pub async fn guest(&self, guest_id: i32) -> Option<GuestStay> {
        self.tables.lock().await.guests.get(&guest_id).cloned()
    }

    /// Makes the next checkout fail at `step`
    pub async fn fail_at(&self, step: SettlementStep) {
        *self.injected_failure.lock().await = Some(step);
    }

    /// Ledger view over one source of this store's charges
    pub fn charge_ledger(store: &Arc<Self>, source: ChargeSource) -> Arc<dyn ChargeLedger> {
        Arc::new(InMemoryChargeLedger {
            store: Arc::clone(store),
            source,
        })
    }
}

#[async_trait]
impl GuestDirectory for InMemoryHotelStore {
    async fn find_guest(&self, guest_id: i32) -> Result<Option<GuestStay>, SettlementError> {
        Ok(self.guest(guest_id).await)
    }

    async fn latest_guest_in_room(
        &self,
        room_number: &str,
    ) -> Result<Option<GuestStay>, SettlementError> {
        let tables = self.tables.lock().await;
        // Guest ids grow with registration order
        Ok(tables
            .guests
            .values()
            .filter(|guest| guest.room_number == room_number)
            .max_by_key(|guest| guest.guest_id)
            .cloned())
    }
}

#[async_trait]
impl SettlementUnitOfWork for InMemoryHotelStore {
    #[instrument(skip(self, draft), fields(guest_id = draft.guest_id))]
    async fn settle(&self, draft: &InvoiceDraft) -> Result<InvoiceModel, SettlementError> {
        let mut tables = self.tables.lock().await;
        let failure = self.injected_failure.lock().await.take();
        let fail = |step: SettlementStep| -> Result<(), SettlementError> {
            if failure == Some(step) {
                warn!(step = %step, "Injected settlement failure");
                return Err(SettlementError::SettlementFailed(format!(
                    "step {} failed",
                    step
                )));
            }
            Ok(())
        };

        let mut working = tables.clone();

        fail(SettlementStep::LockGuest)?;
        let guest = working
            .guests
            .get(&draft.guest_id)
            .ok_or_else(|| SettlementError::GuestNotFound(format!("guest {}", draft.guest_id)))?;
        if guest.status == GuestStatus::CheckedOut {
            return Err(SettlementError::AlreadySettled(draft.guest_id));
        }

        fail(SettlementStep::InsertInvoice)?;
        working.next_invoice_id += 1;
        let invoice = InvoiceModel::from_draft(working.next_invoice_id, draft, Utc::now());
        working.invoices.push(invoice.clone());

        for (step, source, expected) in [
            (
                SettlementStep::MarkLaundryPaid,
                ChargeSource::Laundry,
                draft.laundry_lines,
            ),
            (
                SettlementStep::MarkRestaurantPaid,
                ChargeSource::Restaurant,
                draft.restaurant_lines,
            ),
        ] {
            fail(step)?;
            let mut flipped = 0u64;
            for line in working.charges.iter_mut().filter(|line| {
                line.guest_id == draft.guest_id && line.source == source && !line.paid
            }) {
                line.paid = true;
                flipped += 1;
            }
            check_flipped(source, flipped, expected)?;
        }

        fail(SettlementStep::MarkGuestCheckedOut)?;
        if let Some(guest) = working.guests.get_mut(&draft.guest_id) {
            guest.status = GuestStatus::CheckedOut;
        }

        *tables = working;
        debug!(invoice_id = invoice.id, "Settlement committed in memory");
        Ok(invoice)
    }
}

/// One source's view of [`InMemoryHotelStore`] charges
pub struct InMemoryChargeLedger {
    store: Arc<InMemoryHotelStore>,
    source: ChargeSource,
}

#[async_trait]
impl ChargeLedger for InMemoryChargeLedger {
    fn source(&self) -> ChargeSource {
        self.source
    }

    async fn unpaid_charges(&self, guest_id: i32) -> Result<Vec<ChargeLine>, SettlementError> {
        let tables = self.store.tables.lock().await;
        Ok(tables
            .charges
            .iter()
            .filter(|line| line.guest_id == guest_id && line.source == self.source && !line.paid)
            .cloned()
            .collect())
    }
}

const GUEST_SELECT: &str = "SELECT g.id, g.name, g.room_number, g.check_in_date, g.check_out_date, \
     COALESCE(g.status, 'CHECKED_IN') AS status, r.price \
     FROM guests g JOIN rooms r ON r.room_number = g.room_number";

fn guest_from_row(row: &PgRow) -> Result<GuestStay, SettlementError> {
    let status: String = row.try_get("status")?;
    Ok(GuestStay {
        guest_id: row.try_get("id")?,
        name: row.try_get("name")?,
        room_number: row.try_get("room_number")?,
        check_in: row.try_get::<DateTime<Utc>, _>("check_in_date")?,
        check_out: row.try_get::<DateTime<Utc>, _>("check_out_date")?,
        nightly_rate: row.try_get("price")?,
        status: status
            .parse()
            .map_err(|_| SettlementError::Storage(format!("Unexpected guest status: {}", status)))?,
    })
}

/// PostgreSQL guest lookups, joined with the room's nightly price
pub struct PostgresGuestDirectory {
    pool: PgPool,
}

impl PostgresGuestDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuestDirectory for PostgresGuestDirectory {
    #[instrument(skip(self))]
    async fn find_guest(&self, guest_id: i32) -> Result<Option<GuestStay>, SettlementError> {
        let query = format!("{} WHERE g.id = $1", GUEST_SELECT);
        let row = sqlx::query(&query)
            .bind(guest_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, guest_id = guest_id, "Failed to fetch guest");
                SettlementError::from(e)
            })?;

        row.as_ref().map(guest_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn latest_guest_in_room(
        &self,
        room_number: &str,
    ) -> Result<Option<GuestStay>, SettlementError> {
        let query = format!(
            "{} WHERE g.room_number = $1 ORDER BY g.created_at DESC LIMIT 1",
            GUEST_SELECT
        );
        let row = sqlx::query(&query)
            .bind(room_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_number = %room_number, "Failed to fetch guest by room");
                SettlementError::from(e)
            })?;

        row.as_ref().map(guest_from_row).transpose()
    }
}

fn ledger_table(source: ChargeSource) -> &'static str {
    match source {
        ChargeSource::Laundry => "laundry_requests",
        ChargeSource::Restaurant => "restaurant_orders",
    }
}

/// PostgreSQL view over `laundry_requests` or `restaurant_orders`
pub struct PostgresChargeLedger {
    pool: PgPool,
    source: ChargeSource,
}

impl PostgresChargeLedger {
    pub fn new(pool: PgPool, source: ChargeSource) -> Self {
        Self { pool, source }
    }
}

#[async_trait]
impl ChargeLedger for PostgresChargeLedger {
    fn source(&self) -> ChargeSource {
        self.source
    }

    #[instrument(skip(self), fields(source = %self.source))]
    async fn unpaid_charges(&self, guest_id: i32) -> Result<Vec<ChargeLine>, SettlementError> {
        let query = format!(
            "SELECT id, guest_id, total_price FROM {} WHERE guest_id = $1 AND status != 'PAID' ORDER BY id",
            ledger_table(self.source)
        );
        let rows = sqlx::query(&query)
            .bind(guest_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, guest_id = guest_id, "Failed to fetch unpaid charges");
                SettlementError::from(e)
            })?;

        rows.iter()
            .map(|row| -> Result<ChargeLine, SettlementError> {
                Ok(ChargeLine {
                    source: self.source,
                    reference_id: row.try_get("id")?,
                    guest_id: row.try_get("guest_id")?,
                    amount: row.try_get("total_price")?,
                    paid: false,
                })
            })
            .collect()
    }
}

/// PostgreSQL checkout transaction
pub struct PostgresSettlementUnitOfWork {
    pool: PgPool,
}

impl PostgresSettlementUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run_steps(
        tx: &mut Transaction<'_, Postgres>,
        draft: &InvoiceDraft,
    ) -> Result<InvoiceModel, SettlementError> {
        let failed_at = |step: SettlementStep| {
            move |e: sqlx::Error| {
                warn!(error = %e, step = %step, "Settlement step failed");
                SettlementError::SettlementFailed(format!("step {} failed: {}", step, e))
            }
        };

        let locked = sqlx::query("SELECT COALESCE(status, 'CHECKED_IN') AS status FROM guests WHERE id = $1 FOR UPDATE")
            .bind(draft.guest_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(failed_at(SettlementStep::LockGuest))?
            .ok_or_else(|| SettlementError::GuestNotFound(format!("guest {}", draft.guest_id)))?;
        let status: String = locked
            .try_get("status")
            .map_err(failed_at(SettlementStep::LockGuest))?;
        if status == GuestStatus::CheckedOut.to_string() {
            return Err(SettlementError::AlreadySettled(draft.guest_id));
        }

        let created_at = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO invoices (guest_id, room_number, room_charge, laundry_charge, restaurant_charge, total_amount, payment_method, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(draft.guest_id)
        .bind(&draft.room_number)
        .bind(draft.room_total)
        .bind(draft.laundry_total)
        .bind(draft.restaurant_total)
        .bind(draft.grand_total)
        .bind(&draft.payment_method)
        .bind(created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(failed_at(SettlementStep::InsertInvoice))?;
        let invoice_id: i32 = inserted
            .try_get("id")
            .map_err(failed_at(SettlementStep::InsertInvoice))?;

        for (current, source, expected) in [
            (
                SettlementStep::MarkLaundryPaid,
                ChargeSource::Laundry,
                draft.laundry_lines,
            ),
            (
                SettlementStep::MarkRestaurantPaid,
                ChargeSource::Restaurant,
                draft.restaurant_lines,
            ),
        ] {
            let query = format!(
                "UPDATE {} SET status = 'PAID' WHERE guest_id = $1 AND status != 'PAID'",
                ledger_table(source)
            );
            let flipped = sqlx::query(&query)
                .bind(draft.guest_id)
                .execute(&mut **tx)
                .await
                .map_err(failed_at(current))?
                .rows_affected();
            check_flipped(source, flipped, expected)?;
        }

        sqlx::query("UPDATE guests SET status = 'CHECKED_OUT' WHERE id = $1")
            .bind(draft.guest_id)
            .execute(&mut **tx)
            .await
            .map_err(failed_at(SettlementStep::MarkGuestCheckedOut))?;

        Ok(InvoiceModel::from_draft(invoice_id, draft, created_at))
    }
}

#[async_trait]
impl SettlementUnitOfWork for PostgresSettlementUnitOfWork {
    #[instrument(skip(self, draft), fields(guest_id = draft.guest_id))]
    async fn settle(&self, draft: &InvoiceDraft) -> Result<InvoiceModel, SettlementError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            warn!(error = %e, "Failed to open settlement transaction");
            SettlementError::SettlementFailed(e.to_string())
        })?;

        // Dropping `tx` on an early return rolls everything back
        let invoice = Self::run_steps(&mut tx, draft).await?;

        tx.commit().await.map_err(|e| {
            warn!(error = %e, "Failed to commit settlement transaction");
            SettlementError::SettlementFailed(e.to_string())
        })?;

        info!(invoice_id = invoice.id, "Settlement committed");
        Ok(invoice)
    }
}
