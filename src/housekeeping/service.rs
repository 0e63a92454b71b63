use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::models::{
    AmenityRequestModel, MaintenanceTicketModel, NewAmenityRequest, NewMaintenanceTicket,
    RoomState, RoomStatus, TicketPriority,
};
use super::repository::HousekeepingRepository;
use crate::event::{write_then_notify, EventEnvelope, HubHandle};
use crate::shared::AppError;

/// Housekeeping workflows: room status changes, amenity requests and tickets
///
/// Every mutation that the live map cares about is persisted first and then
/// announced through the hub.
pub struct HousekeepingService {
    repository: Arc<dyn HousekeepingRepository>,
    hub: HubHandle,
}

fn require_room(room_number: &str) -> Result<&str, AppError> {
    let room_number = room_number.trim();
    if room_number.is_empty() {
        warn!("Rejected housekeeping request without a room number");
        return Err(AppError::Validation("room_number is required".to_string()));
    }
    Ok(room_number)
}

impl HousekeepingService {
    pub fn new(repository: Arc<dyn HousekeepingRepository>, hub: HubHandle) -> Self {
        Self { repository, hub }
    }

    /// Guest-facing request for a room clean
    #[instrument(skip(self))]
    pub async fn request_cleaning(&self, room_number: &str) -> Result<RoomState, AppError> {
        self.update_room_status(room_number, RoomStatus::RequestedCleaning)
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
    ) -> Result<RoomState, AppError> {
        let room_number = require_room(room_number)?;

        let room = write_then_notify(
            &self.hub,
            self.repository.set_room_status(room_number, status),
            |room: &RoomState| EventEnvelope::room_update(room.room_number.clone(), room.status),
        )
        .await?;

        info!(room_number = %room.room_number, status = %room.status, "Room status updated");
        Ok(room)
    }

    #[instrument(skip(self))]
    pub async fn mark_clean(&self, room_number: &str) -> Result<RoomState, AppError> {
        self.update_room_status(room_number, RoomStatus::Clean).await
    }

    /// Full-state pull for terminals that missed pushes
    #[instrument(skip(self))]
    pub async fn live_status(&self) -> Result<Vec<RoomState>, AppError> {
        self.repository.list_rooms().await
    }

    #[instrument(skip(self, item_name))]
    pub async fn request_amenity(
        &self,
        guest_id: i32,
        room_number: &str,
        item_name: &str,
        quantity: i32,
    ) -> Result<AmenityRequestModel, AppError> {
        let room_number = require_room(room_number)?;
        let item_name = item_name.trim();
        if item_name.is_empty() {
            return Err(AppError::Validation("amenity is required".to_string()));
        }
        if quantity < 1 {
            return Err(AppError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let request = NewAmenityRequest {
            guest_id,
            room_number: room_number.to_string(),
            item_name: item_name.to_string(),
            quantity,
        };

        let stored = write_then_notify(
            &self.hub,
            self.repository.create_amenity_request(&request),
            |stored: &AmenityRequestModel| EventEnvelope::NewTask(stored.clone()),
        )
        .await?;

        info!(
            amenity_id = stored.id,
            guest_id = stored.guest_id,
            room_number = %stored.room_number,
            "Amenity requested"
        );
        Ok(stored)
    }

    #[instrument(skip(self, description))]
    pub async fn report_issue(
        &self,
        room_number: &str,
        issue_type: &str,
        description: &str,
    ) -> Result<MaintenanceTicketModel, AppError> {
        let room_number = require_room(room_number)?;
        let issue_type = issue_type.trim();
        if issue_type.is_empty() {
            return Err(AppError::Validation("issue_type is required".to_string()));
        }

        let ticket = NewMaintenanceTicket {
            room_number: room_number.to_string(),
            issue_type: issue_type.to_string(),
            description: description.to_string(),
            priority: TicketPriority::Normal,
        };

        let stored = write_then_notify(
            &self.hub,
            self.repository.create_ticket(&ticket),
            |stored: &MaintenanceTicketModel| EventEnvelope::NewTicket(stored.clone()),
        )
        .await?;

        info!(ticket_id = stored.id, room_number = %stored.room_number, "Maintenance issue reported");
        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn amenity_requests(&self) -> Result<Vec<AmenityRequestModel>, AppError> {
        self.repository.pending_amenity_requests().await
    }

    #[instrument(skip(self))]
    pub async fn maintenance_tickets(&self) -> Result<Vec<MaintenanceTicketModel>, AppError> {
        self.repository.open_tickets().await
    }

    #[instrument(skip(self))]
    pub async fn mark_amenity_delivered(&self, id: i32) -> Result<AmenityRequestModel, AppError> {
        let delivered = self.repository.mark_amenity_delivered(id).await?;
        info!(amenity_id = id, "Amenity marked delivered");
        Ok(delivered)
    }

    #[instrument(skip(self))]
    pub async fn resolve_ticket(&self, id: i32) -> Result<MaintenanceTicketModel, AppError> {
        let resolved = self.repository.resolve_ticket(id).await?;
        info!(ticket_id = id, "Ticket resolved");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Hub, HubConfig, SessionQueue};
    use crate::housekeeping::models::{AmenityStatus, TicketStatus};
    use crate::housekeeping::repository::InMemoryHousekeepingRepository;
    use async_trait::async_trait;
    use tokio::sync::mpsc::error::TryRecvError;
    use uuid::Uuid;

    /// Repository whose writes always fail
    struct FailingRepository;

    #[async_trait]
    impl HousekeepingRepository for FailingRepository {
        async fn list_rooms(&self) -> Result<Vec<RoomState>, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn set_room_status(
            &self,
            _room_number: &str,
            _status: RoomStatus,
        ) -> Result<RoomState, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn create_amenity_request(
            &self,
            _request: &NewAmenityRequest,
        ) -> Result<AmenityRequestModel, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn pending_amenity_requests(&self) -> Result<Vec<AmenityRequestModel>, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn mark_amenity_delivered(&self, _id: i32) -> Result<AmenityRequestModel, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn create_ticket(
            &self,
            _ticket: &NewMaintenanceTicket,
        ) -> Result<MaintenanceTicketModel, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn open_tickets(&self) -> Result<Vec<MaintenanceTicketModel>, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }

        async fn resolve_ticket(&self, _id: i32) -> Result<MaintenanceTicketModel, AppError> {
            Err(AppError::DatabaseError("connection refused".to_string()))
        }
    }

    async fn service_with_listener(
        repository: Arc<dyn HousekeepingRepository>,
    ) -> (HousekeepingService, SessionQueue) {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let queue = hub.register(Uuid::new_v4()).await.unwrap();
        (HousekeepingService::new(repository, hub), queue)
    }

    fn rooms() -> Arc<dyn HousekeepingRepository> {
        Arc::new(InMemoryHousekeepingRepository::with_rooms(["101", "102"]))
    }

    #[tokio::test]
    async fn test_request_cleaning_persists_then_broadcasts() {
        let (service, mut queue) = service_with_listener(rooms()).await;

        let room = service.request_cleaning("101").await.unwrap();
        assert_eq!(room.status, RoomStatus::RequestedCleaning);

        let event = queue.recv().await.unwrap();
        assert_eq!(
            *event,
            EventEnvelope::room_update("101", RoomStatus::RequestedCleaning)
        );

        let live = service.live_status().await.unwrap();
        assert_eq!(live[0].status, RoomStatus::RequestedCleaning);
        assert_eq!(live[1].status, RoomStatus::Clean);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found_and_silent() {
        let (service, mut queue) = service_with_listener(rooms()).await;

        let result = service.update_room_status("999", RoomStatus::Dirty).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        service.mark_clean("102").await.unwrap();
        let event = queue.recv().await.unwrap();
        assert_eq!(event.room_number(), "102");
    }

    #[tokio::test]
    async fn test_failed_write_publishes_nothing() {
        let (service, mut queue) = service_with_listener(Arc::new(FailingRepository)).await;

        let result = service.request_cleaning("101").await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));

        let result = service.request_amenity(1, "101", "Towels", 2).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));

        let result = service.report_issue("101", "PLUMBING", "Leak").await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));

        tokio::task::yield_now().await;
        assert_eq!(queue.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_validation_failures_have_no_side_effects() {
        let repository = Arc::new(InMemoryHousekeepingRepository::with_rooms(["101"]));
        let (service, mut queue) = service_with_listener(repository.clone()).await;

        assert!(matches!(
            service.request_cleaning("   ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.request_amenity(1, "101", "", 1).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.request_amenity(1, "101", "Towels", 0).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.report_issue("101", " ", "Leak").await,
            Err(AppError::Validation(_))
        ));

        assert!(repository.pending_amenity_requests().await.unwrap().is_empty());
        assert!(repository.open_tickets().await.unwrap().is_empty());
        tokio::task::yield_now().await;
        assert_eq!(queue.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_amenity_request_broadcasts_stored_task() {
        let (service, mut queue) = service_with_listener(rooms()).await;

        let stored = service
            .request_amenity(7, "102", "Extra pillows", 2)
            .await
            .unwrap();
        assert_eq!(stored.status, AmenityStatus::Pending);

        let event = queue.recv().await.unwrap();
        assert_eq!(*event, EventEnvelope::NewTask(stored.clone()));

        // Delivery is not broadcast
        service.mark_amenity_delivered(stored.id).await.unwrap();
        assert!(service.amenity_requests().await.unwrap().is_empty());
        tokio::task::yield_now().await;
        assert_eq!(queue.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_reported_issue_is_open_normal_priority() {
        let (service, mut queue) = service_with_listener(rooms()).await;

        let ticket = service
            .report_issue("101", "HVAC", "Air conditioning is loud")
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::Normal);

        let event = queue.recv().await.unwrap();
        assert_eq!(event.event_type(), "NEW_TICKET");

        service.resolve_ticket(ticket.id).await.unwrap();
        assert!(service.maintenance_tickets().await.unwrap().is_empty());
        assert!(matches!(
            service.resolve_ticket(ticket.id + 100).await,
            Err(AppError::NotFound(_))
        ));
    }
}
