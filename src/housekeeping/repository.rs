use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::BTreeMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{
    AmenityRequestModel, AmenityStatus, MaintenanceTicketModel, NewAmenityRequest,
    NewMaintenanceTicket, RoomState, RoomStatus, TicketPriority, TicketStatus,
};
use crate::shared::AppError;

/// Trait for housekeeping persistence
#[async_trait]
pub trait HousekeepingRepository: Send + Sync {
    /// All rooms ordered by room number
    async fn list_rooms(&self) -> Result<Vec<RoomState>, AppError>;

    /// Sets the status of an existing room; `NotFound` for an unknown room
    async fn set_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
    ) -> Result<RoomState, AppError>;

    async fn create_amenity_request(
        &self,
        request: &NewAmenityRequest,
    ) -> Result<AmenityRequestModel, AppError>;

    /// Pending requests, newest first
    async fn pending_amenity_requests(&self) -> Result<Vec<AmenityRequestModel>, AppError>;

    async fn mark_amenity_delivered(&self, id: i32) -> Result<AmenityRequestModel, AppError>;

    async fn create_ticket(
        &self,
        ticket: &NewMaintenanceTicket,
    ) -> Result<MaintenanceTicketModel, AppError>;

    /// Unresolved tickets, highest priority first, then newest first
    async fn open_tickets(&self) -> Result<Vec<MaintenanceTicketModel>, AppError>;

    async fn resolve_ticket(&self, id: i32) -> Result<MaintenanceTicketModel, AppError>;
}

#[derive(Default)]
struct HousekeepingTables {
    rooms: BTreeMap<String, RoomStatus>,
    amenity_requests: Vec<AmenityRequestModel>,
    tickets: Vec<MaintenanceTicketModel>,
    next_amenity_id: i32,
    next_ticket_id: i32,
}

/// In-memory implementation of HousekeepingRepository for development and testing
///
/// Data is lost when the application restarts.
pub struct InMemoryHousekeepingRepository {
    tables: RwLock<HousekeepingTables>,
}

impl Default for InMemoryHousekeepingRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHousekeepingRepository {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HousekeepingTables::default()),
        }
    }

    /// Creates a repository with the given rooms, all starting CLEAN
    pub fn with_rooms<I, S>(room_numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rooms = room_numbers
            .into_iter()
            .map(|room| (room.into(), RoomStatus::Clean))
            .collect();

        Self {
            tables: RwLock::new(HousekeepingTables {
                rooms,
                ..HousekeepingTables::default()
            }),
        }
    }
}

#[async_trait]
impl HousekeepingRepository for InMemoryHousekeepingRepository {
    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomState>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rooms
            .iter()
            .map(|(room_number, status)| RoomState {
                room_number: room_number.clone(),
                status: *status,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn set_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
    ) -> Result<RoomState, AppError> {
        let mut tables = self.tables.write().await;
        let current = tables.rooms.get_mut(room_number).ok_or_else(|| {
            debug!(room_number = %room_number, "Room not found in memory");
            AppError::NotFound(format!("Room {} not found", room_number))
        })?;
        *current = status;

        debug!(room_number = %room_number, status = %status, "Room status updated in memory");
        Ok(RoomState {
            room_number: room_number.to_string(),
            status,
        })
    }

    #[instrument(skip(self, request))]
    async fn create_amenity_request(
        &self,
        request: &NewAmenityRequest,
    ) -> Result<AmenityRequestModel, AppError> {
        let mut tables = self.tables.write().await;
        tables.next_amenity_id += 1;

        let stored = AmenityRequestModel {
            id: tables.next_amenity_id,
            guest_id: request.guest_id,
            room_number: request.room_number.clone(),
            item_name: request.item_name.clone(),
            quantity: request.quantity,
            status: AmenityStatus::Pending,
            created_at: Utc::now(),
        };
        tables.amenity_requests.push(stored.clone());

        debug!(amenity_id = stored.id, room_number = %stored.room_number, "Amenity request stored in memory");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn pending_amenity_requests(&self) -> Result<Vec<AmenityRequestModel>, AppError> {
        let tables = self.tables.read().await;
        let mut pending: Vec<_> = tables
            .amenity_requests
            .iter()
            .filter(|request| request.status == AmenityStatus::Pending)
            .cloned()
            .collect();
        // Ids break timestamp ties so insertion order stays observable
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(pending)
    }

    #[instrument(skip(self))]
    async fn mark_amenity_delivered(&self, id: i32) -> Result<AmenityRequestModel, AppError> {
        let mut tables = self.tables.write().await;
        let request = tables
            .amenity_requests
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Amenity request {} not found", id)))?;
        request.status = AmenityStatus::Delivered;
        Ok(request.clone())
    }

    #[instrument(skip(self, ticket))]
    async fn create_ticket(
        &self,
        ticket: &NewMaintenanceTicket,
    ) -> Result<MaintenanceTicketModel, AppError> {
        let mut tables = self.tables.write().await;
        tables.next_ticket_id += 1;

        let stored = MaintenanceTicketModel {
            id: tables.next_ticket_id,
            room_number: ticket.room_number.clone(),
            issue_type: ticket.issue_type.clone(),
            description: ticket.description.clone(),
            priority: ticket.priority,
            status: TicketStatus::Open,
            reported_at: Utc::now(),
        };
        tables.tickets.push(stored.clone());

        debug!(ticket_id = stored.id, room_number = %stored.room_number, "Ticket stored in memory");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn open_tickets(&self) -> Result<Vec<MaintenanceTicketModel>, AppError> {
        let tables = self.tables.read().await;
        let mut open: Vec<_> = tables
            .tickets
            .iter()
            .filter(|ticket| ticket.status != TicketStatus::Resolved)
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.reported_at.cmp(&a.reported_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(open)
    }

    #[instrument(skip(self))]
    async fn resolve_ticket(&self, id: i32) -> Result<MaintenanceTicketModel, AppError> {
        let mut tables = self.tables.write().await;
        let ticket = tables
            .tickets
            .iter_mut()
            .find(|ticket| ticket.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))?;
        ticket.status = TicketStatus::Resolved;
        Ok(ticket.clone())
    }
}

/// PostgreSQL implementation of HousekeepingRepository
pub struct PostgresHousekeepingRepository {
    pool: PgPool,
}

impl PostgresHousekeepingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        warn!(error = %e, "{}", context);
        AppError::DatabaseError(e.to_string())
    }
}

fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> Result<T, AppError> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
    raw.parse()
        .map_err(|_| AppError::DatabaseError(format!("Unexpected {} value: {}", column, raw)))
}

fn amenity_from_row(row: &PgRow) -> Result<AmenityRequestModel, AppError> {
    Ok(AmenityRequestModel {
        id: row.get("id"),
        guest_id: row.get("guest_id"),
        room_number: row.get("room_number"),
        item_name: row.get("item_name"),
        quantity: row.get("quantity"),
        status: parse_column(row, "status")?,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

fn ticket_from_row(row: &PgRow) -> Result<MaintenanceTicketModel, AppError> {
    Ok(MaintenanceTicketModel {
        id: row.get("id"),
        room_number: row.get("room_number"),
        issue_type: row.get("issue_type"),
        description: row.get("description"),
        priority: parse_column::<TicketPriority>(row, "priority")?,
        status: parse_column(row, "status")?,
        reported_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

const AMENITY_COLUMNS: &str = "id, guest_id, room_number, item_name, quantity, status, created_at";
const TICKET_COLUMNS: &str =
    "id, room_number, issue_type, description, priority, status, created_at";

#[async_trait]
impl HousekeepingRepository for PostgresHousekeepingRepository {
    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomState>, AppError> {
        let rows = sqlx::query(
            "SELECT room_number, COALESCE(housekeeping_status, 'CLEAN') AS housekeeping_status FROM rooms ORDER BY room_number ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch room statuses"))?;

        rows.iter()
            .map(|row| -> Result<RoomState, AppError> {
                Ok(RoomState {
                    room_number: row.get("room_number"),
                    status: parse_column(row, "housekeeping_status")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn set_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
    ) -> Result<RoomState, AppError> {
        let result = sqlx::query("UPDATE rooms SET housekeeping_status = $1 WHERE room_number = $2")
            .bind(status.to_string())
            .bind(room_number)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to update room status"))?;

        if result.rows_affected() == 0 {
            debug!(room_number = %room_number, "Room not found in database");
            return Err(AppError::NotFound(format!("Room {} not found", room_number)));
        }

        Ok(RoomState {
            room_number: room_number.to_string(),
            status,
        })
    }

    #[instrument(skip(self, request))]
    async fn create_amenity_request(
        &self,
        request: &NewAmenityRequest,
    ) -> Result<AmenityRequestModel, AppError> {
        let query = format!(
            "INSERT INTO amenity_requests (guest_id, room_number, item_name, quantity, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            AMENITY_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(request.guest_id)
            .bind(&request.room_number)
            .bind(&request.item_name)
            .bind(request.quantity)
            .bind(AmenityStatus::Pending.to_string())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to insert amenity request"))?;

        amenity_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn pending_amenity_requests(&self) -> Result<Vec<AmenityRequestModel>, AppError> {
        let query = format!(
            "SELECT {} FROM amenity_requests WHERE status = 'PENDING' ORDER BY created_at DESC, id DESC",
            AMENITY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch amenity requests"))?;

        rows.iter().map(amenity_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn mark_amenity_delivered(&self, id: i32) -> Result<AmenityRequestModel, AppError> {
        let query = format!(
            "UPDATE amenity_requests SET status = $1 WHERE id = $2 RETURNING {}",
            AMENITY_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(AmenityStatus::Delivered.to_string())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update amenity request"))?
            .ok_or_else(|| AppError::NotFound(format!("Amenity request {} not found", id)))?;

        amenity_from_row(&row)
    }

    #[instrument(skip(self, ticket))]
    async fn create_ticket(
        &self,
        ticket: &NewMaintenanceTicket,
    ) -> Result<MaintenanceTicketModel, AppError> {
        let query = format!(
            "INSERT INTO maintenance_tickets (room_number, issue_type, description, priority, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            TICKET_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&ticket.room_number)
            .bind(&ticket.issue_type)
            .bind(&ticket.description)
            .bind(ticket.priority.to_string())
            .bind(TicketStatus::Open.to_string())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to insert maintenance ticket"))?;

        ticket_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn open_tickets(&self) -> Result<Vec<MaintenanceTicketModel>, AppError> {
        let query = format!(
            "SELECT {} FROM maintenance_tickets WHERE status != 'RESOLVED' \
             ORDER BY CASE priority WHEN 'HIGH' THEN 2 WHEN 'NORMAL' THEN 1 ELSE 0 END DESC, created_at DESC, id DESC",
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch maintenance tickets"))?;

        rows.iter().map(ticket_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn resolve_ticket(&self, id: i32) -> Result<MaintenanceTicketModel, AppError> {
        let query = format!(
            "UPDATE maintenance_tickets SET status = $1 WHERE id = $2 RETURNING {}",
            TICKET_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(TicketStatus::Resolved.to_string())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to resolve maintenance ticket"))?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))?;

        ticket_from_row(&row)
    }
}
