#![allow(dead_code)] // Test utilities may not all be used in every test

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use oasis::{
    auth::{GuestClaims, TokenConfig},
    event::{Hub, HubConfig, HubHandle, SessionId},
    housekeeping::{HousekeepingService, InMemoryHousekeepingRepository},
    settlement::{ChargeSource, GuestStay, InMemoryHotelStore, SettlementEngine},
    websockets::{ClientSession, SessionConfig, SessionError, SessionExit},
    AppState,
};

use super::mocks::{MockSocket, MockSocketRemote};

pub const TEST_SECRET: &str = "integration-secret";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub hub: HubHandle,
    pub store: Arc<InMemoryHotelStore>,
    session_config: SessionConfig,
    _hub_task: JoinHandle<()>,
}

/// A connected staff terminal driven by the test
pub struct MockTerminal {
    pub id: SessionId,
    pub remote: MockSocketRemote,
    pub task: JoinHandle<Result<SessionExit, SessionError>>,
}

pub struct TestSetupBuilder {
    rooms: Vec<String>,
    guests: Vec<GuestStay>,
    charges: Vec<(ChargeSource, i32, Decimal)>,
    session_queue_capacity: usize,
    session_config: SessionConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            rooms: vec![],
            guests: vec![],
            charges: vec![],
            session_queue_capacity: HubConfig::default().session_queue_capacity,
            session_config: SessionConfig {
                ping_interval: Duration::from_secs(5),
                liveness_timeout: Duration::from_secs(30),
            },
        }
    }

    pub fn with_rooms(mut self, rooms: &[&str]) -> Self {
        self.rooms = rooms.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_guest(mut self, guest: GuestStay) -> Self {
        self.guests.push(guest);
        self
    }

    pub fn with_charge(mut self, source: ChargeSource, guest_id: i32, amount: i64) -> Self {
        self.charges.push((source, guest_id, Decimal::from(amount)));
        self
    }

    pub fn with_session_queue_capacity(mut self, capacity: usize) -> Self {
        self.session_queue_capacity = capacity;
        self
    }

    pub fn with_session_timing(mut self, ping_interval: Duration, liveness_timeout: Duration) -> Self {
        self.session_config = SessionConfig {
            ping_interval,
            liveness_timeout,
        };
        self
    }

    pub async fn build(self) -> TestSetup {
        let (hub, hub_task) = Hub::spawn(HubConfig {
            session_queue_capacity: self.session_queue_capacity,
            ..HubConfig::default()
        });

        let housekeeping = Arc::new(HousekeepingService::new(
            Arc::new(InMemoryHousekeepingRepository::with_rooms(self.rooms)),
            hub.clone(),
        ));

        let store = Arc::new(InMemoryHotelStore::new());
        for guest in self.guests {
            store.add_guest(guest).await;
        }
        for (source, guest_id, amount) in self.charges {
            store.add_charge(source, guest_id, amount).await;
        }

        let engine = SettlementEngine::new(
            store.clone(),
            InMemoryHotelStore::charge_ledger(&store, ChargeSource::Laundry),
            InMemoryHotelStore::charge_ledger(&store, ChargeSource::Restaurant),
            store.clone(),
        )
        .with_housekeeping(housekeeping.clone());

        let token_config = TokenConfig::with_secret(TEST_SECRET);
        let session_config = self.session_config;

        let app_state = AppState::new(
            hub.clone(),
            housekeeping,
            Arc::new(engine),
            token_config,
            session_config.clone(),
        );

        TestSetup {
            app: oasis::build_router(app_state),
            hub,
            store,
            session_config,
            _hub_task: hub_task,
        }
    }
}

impl TestSetup {
    /// Sends a request through the router and returns status and JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<&str>,
        bearer: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = builder
            .body(Body::from(body.unwrap_or_default().to_string()))
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Signs a guest token the way the login collaborator would
    pub fn guest_token(&self, guest_id: i32, valid_for: chrono::Duration) -> String {
        let now = chrono::Utc::now();
        let claims = GuestClaims {
            sub: guest_id,
            exp: (now + valid_for).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub async fn connect_terminal(&self) -> MockTerminal {
        self.start_terminal(MockSocket::new()).await
    }

    pub async fn connect_stalled_terminal(&self) -> MockTerminal {
        self.start_terminal(MockSocket::stalled()).await
    }

    async fn start_terminal(&self, (socket, remote): (MockSocket, MockSocketRemote)) -> MockTerminal {
        let mut session = ClientSession::new(
            Box::new(socket),
            self.hub.clone(),
            self.session_config.clone(),
        );
        let id = session.id();
        let task = tokio::spawn(async move { session.run().await });

        self.wait_until(|sessions| sessions.contains(&id)).await;
        MockTerminal { id, remote, task }
    }

    /// Polls the hub until the connected set satisfies `condition`
    pub async fn wait_until(&self, condition: impl Fn(&[SessionId]) -> bool) {
        for _ in 0..200 {
            let sessions = self.hub.connected_sessions().await.unwrap();
            if condition(&sessions) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub never reached the expected set of sessions");
    }
}

impl MockTerminal {
    /// Next delivered envelope as JSON
    pub async fn next_message(&mut self) -> serde_json::Value {
        let raw = tokio::time::timeout(Duration::from_secs(1), self.remote.outbound.recv())
            .await
            .expect("terminal should receive a message")
            .expect("terminal socket closed");
        serde_json::from_str(&raw).unwrap()
    }

    pub async fn assert_silent(&mut self) {
        let received =
            tokio::time::timeout(Duration::from_millis(50), self.remote.outbound.recv()).await;
        assert!(
            !matches!(received, Ok(Some(_))),
            "terminal should not have received anything"
        );
    }
}
