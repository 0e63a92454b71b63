use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::{EventEnvelope, HubHandle, SessionId, SessionQueue};

/// What the terminal sent us
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    /// Pong, ping or binary frame; only proves the peer is alive
    Heartbeat,
    Closed,
}

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the terminal
    async fn send_message(&mut self, message: String) -> Result<(), SessionError>;

    /// Send a ping to check the terminal is alive
    async fn send_ping(&mut self) -> Result<(), SessionError>;

    /// Receive the next frame from the terminal
    async fn receive_message(&mut self) -> Result<InboundFrame, SessionError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SessionError>;
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Event hub unavailable")]
    HubUnavailable,

    #[error("Session already started")]
    AlreadyStarted,
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SessionError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SessionError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SessionError> {
        self.send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SessionError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<InboundFrame, SessionError> {
        match self.next().await {
            Some(Ok(Message::Text(text))) => Ok(InboundFrame::Text(text)),
            Some(Ok(Message::Close(_))) => Ok(InboundFrame::Closed),
            Some(Ok(_)) => Ok(InboundFrame::Heartbeat),
            Some(Err(e)) => Err(SessionError::ReceiveFailed(e.to_string())),
            None => Ok(InboundFrame::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SessionError::SendFailed(e.to_string()))
    }
}

/// Lifecycle of a staff terminal connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Registered,
    Closed,
}

impl SessionState {
    /// Closed is terminal and Registered is only reachable from Connecting
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Connecting, SessionState::Registered)
                | (SessionState::Connecting, SessionState::Closed)
                | (SessionState::Registered, SessionState::Closed)
        )
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    ClientClosed,
    /// The hub dropped our queue, either for falling behind or on shutdown
    QueueClosed,
    LivenessExpired,
    /// A write to the terminal did not complete within the liveness timeout
    SendStalled,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ping_interval: Duration,
    pub liveness_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            liveness_timeout: Duration::from_secs(60),
        }
    }
}

/// One staff terminal's live connection
///
/// Delivers hub events in queue order while watching the socket for
/// closure, errors and silence. Whichever duty ends first ends the session,
/// and the session then removes itself from the hub. Writes are bounded by
/// the liveness timeout, so a terminal that stops draining its socket cannot
/// hold the session open.
pub struct ClientSession {
    id: SessionId,
    socket: Box<dyn SocketWrapper>,
    hub: HubHandle,
    config: SessionConfig,
    state: SessionState,
}

impl ClientSession {
    pub fn new(socket: Box<dyn SocketWrapper>, hub: HubHandle, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            socket,
            hub,
            config,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            debug!(session_id = %self.id, from = ?self.state, to = ?next, "Session state change");
            self.state = next;
        } else {
            warn!(session_id = %self.id, from = ?self.state, to = ?next, "Ignoring invalid session transition");
        }
    }

    /// Run the session until the terminal goes away or the hub drops it
    pub async fn run(&mut self) -> Result<SessionExit, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::AlreadyStarted);
        }

        let mut queue = match self.hub.register(self.id).await {
            Ok(queue) => queue,
            Err(_) => {
                warn!(session_id = %self.id, "Could not register with event hub");
                self.transition(SessionState::Closed);
                let _ = self.socket.close().await;
                return Err(SessionError::HubUnavailable);
            }
        };
        self.transition(SessionState::Registered);
        info!(session_id = %self.id, "Staff terminal session registered");

        let result = self.pump(&mut queue).await;

        drop(queue);
        self.hub.unregister(self.id).await;
        self.transition(SessionState::Closed);
        let _ = self.socket.close().await;

        match &result {
            Ok(exit) => info!(session_id = %self.id, exit = ?exit, "Staff terminal session closed"),
            Err(e) => warn!(session_id = %self.id, error = %e, "Staff terminal session failed"),
        }

        result
    }

    async fn pump(&mut self, queue: &mut SessionQueue) -> Result<SessionExit, SessionError> {
        let mut ping = interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        let mut last_seen = Instant::now();

        loop {
            let liveness_deadline = last_seen + self.config.liveness_timeout;

            tokio::select! {
                // Outbound: hub events to the terminal
                event = queue.recv() => {
                    match event {
                        Some(event) => {
                            match timeout(self.config.liveness_timeout, self.deliver(&event)).await {
                                Ok(sent) => sent?,
                                Err(_) => {
                                    warn!(session_id = %self.id, event_type = event.event_type(), "Write to terminal stalled");
                                    return Ok(SessionExit::SendStalled);
                                }
                            }
                        }
                        None => return Ok(SessionExit::QueueClosed),
                    }
                }

                // Inbound: anything from the terminal counts as a sign of life
                frame = self.socket.receive_message() => {
                    match frame? {
                        InboundFrame::Text(text) => {
                            debug!(session_id = %self.id, message = %text, "Ignoring terminal message");
                            last_seen = Instant::now();
                        }
                        InboundFrame::Heartbeat => last_seen = Instant::now(),
                        InboundFrame::Closed => return Ok(SessionExit::ClientClosed),
                    }
                }

                _ = ping.tick() => {
                    match timeout(self.config.liveness_timeout, self.socket.send_ping()).await {
                        Ok(sent) => sent?,
                        Err(_) => {
                            warn!(session_id = %self.id, "Ping to terminal stalled");
                            return Ok(SessionExit::SendStalled);
                        }
                    }
                }

                _ = sleep_until(liveness_deadline) => {
                    warn!(session_id = %self.id, "No frames from terminal within liveness timeout");
                    return Ok(SessionExit::LivenessExpired);
                }
            }
        }
    }

    async fn deliver(&mut self, event: &EventEnvelope) -> Result<(), SessionError> {
        match serde_json::to_string(event) {
            Ok(message) => self.socket.send_message(message).await,
            Err(e) => {
                warn!(
                    session_id = %self.id,
                    event_type = event.event_type(),
                    error = %e,
                    "Failed to serialize event, skipping"
                );
                Ok(())
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::channel_socket;
    use super::*;
    use crate::event::{Hub, HubConfig};
    use crate::housekeeping::models::RoomStatus;

    fn quick_config() -> SessionConfig {
        SessionConfig {
            ping_interval: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(30),
        }
    }

    async fn wait_for_sessions(hub: &HubHandle, expected: usize) {
        for _ in 0..100 {
            if hub.connected_sessions().await.unwrap().len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub never reached {} sessions", expected);
    }

    #[test]
    fn test_state_transitions_never_go_backwards() {
        assert!(SessionState::Connecting.can_transition_to(SessionState::Registered));
        assert!(SessionState::Registered.can_transition_to(SessionState::Closed));
        assert!(SessionState::Connecting.can_transition_to(SessionState::Closed));
        assert!(!SessionState::Closed.can_transition_to(SessionState::Registered));
        assert!(!SessionState::Closed.can_transition_to(SessionState::Connecting));
        assert!(!SessionState::Registered.can_transition_to(SessionState::Connecting));
    }

    #[tokio::test]
    async fn test_session_delivers_events_in_order() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let (socket, mut remote) = channel_socket();
        let mut session = ClientSession::new(Box::new(socket), hub.clone(), quick_config());
        assert_eq!(session.state(), SessionState::Connecting);

        let runner = tokio::spawn(async move {
            let exit = session.run().await;
            (exit, session.state())
        });
        wait_for_sessions(&hub, 1).await;

        hub.publish(EventEnvelope::room_update("101", RoomStatus::RequestedCleaning));
        hub.publish(EventEnvelope::room_update("101", RoomStatus::Clean));

        let first: serde_json::Value =
            serde_json::from_str(&remote.outbound.recv().await.unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&remote.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(first["payload"]["status"], "REQUESTED_CLEANING");
        assert_eq!(second["payload"]["status"], "CLEAN");

        remote.inbound.send(InboundFrame::Closed).unwrap();
        let (exit, state) = runner.await.unwrap();

        assert_eq!(exit, Ok(SessionExit::ClientClosed));
        assert_eq!(state, SessionState::Closed);
        wait_for_sessions(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_session_removed_from_hub_on_socket_error() {
        struct BrokenSocket;

        #[async_trait]
        impl SocketWrapper for BrokenSocket {
            async fn send_message(&mut self, _message: String) -> Result<(), SessionError> {
                Ok(())
            }
            async fn send_ping(&mut self) -> Result<(), SessionError> {
                Ok(())
            }
            async fn receive_message(&mut self) -> Result<InboundFrame, SessionError> {
                Err(SessionError::ReceiveFailed("connection reset".to_string()))
            }
            async fn close(&mut self) -> Result<(), SessionError> {
                Ok(())
            }
        }

        let (hub, _task) = Hub::spawn(HubConfig::default());
        let mut session = ClientSession::new(Box::new(BrokenSocket), hub.clone(), quick_config());

        let result = session.run().await;

        assert!(matches!(result, Err(SessionError::ReceiveFailed(_))));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(hub.connected_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_ends_when_liveness_expires() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let (socket, mut remote) = channel_socket();
        let mut session = ClientSession::new(
            Box::new(socket),
            hub.clone(),
            SessionConfig {
                ping_interval: Duration::from_millis(10),
                liveness_timeout: Duration::from_millis(60),
            },
        );

        let exit = session.run().await;

        assert_eq!(exit, Ok(SessionExit::LivenessExpired));
        assert!(remote.pings.try_recv().is_ok(), "session should have pinged");
        assert!(hub.connected_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_write_ends_session_after_eviction() {
        struct StuckSocket;

        #[async_trait]
        impl SocketWrapper for StuckSocket {
            async fn send_message(&mut self, _message: String) -> Result<(), SessionError> {
                std::future::pending().await
            }
            async fn send_ping(&mut self) -> Result<(), SessionError> {
                std::future::pending().await
            }
            async fn receive_message(&mut self) -> Result<InboundFrame, SessionError> {
                std::future::pending().await
            }
            async fn close(&mut self) -> Result<(), SessionError> {
                Ok(())
            }
        }

        let (hub, _task) = Hub::spawn(HubConfig {
            session_queue_capacity: 1,
            ..HubConfig::default()
        });
        let mut session = ClientSession::new(
            Box::new(StuckSocket),
            hub.clone(),
            SessionConfig {
                ping_interval: Duration::from_millis(20),
                liveness_timeout: Duration::from_millis(50),
            },
        );
        let runner = tokio::spawn(async move { session.run().await });
        wait_for_sessions(&hub, 1).await;

        for status in [RoomStatus::Dirty, RoomStatus::Clean, RoomStatus::DoNotDisturb] {
            hub.publish(EventEnvelope::room_update("101", status));
        }

        let exit = tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("session should end on its own")
            .unwrap();
        assert_eq!(exit, Ok(SessionExit::SendStalled));
        wait_for_sessions(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_session_closes_when_hub_stops() {
        let (hub, task) = Hub::spawn(HubConfig::default());
        let (socket, _remote) = channel_socket();
        let mut session = ClientSession::new(Box::new(socket), hub.clone(), quick_config());

        let runner = tokio::spawn(async move { session.run().await });
        wait_for_sessions(&hub, 1).await;

        task.abort();

        assert_eq!(runner.await.unwrap(), Ok(SessionExit::QueueClosed));
    }

    #[tokio::test]
    async fn test_registration_failure_closes_session() {
        let (hub, task) = Hub::spawn(HubConfig::default());
        task.abort();
        let _ = task.await;

        let (socket, _remote) = channel_socket();
        let mut session = ClientSession::new(Box::new(socket), hub, quick_config());

        assert_eq!(session.run().await, Err(SessionError::HubUnavailable));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.run().await, Err(SessionError::AlreadyStarted));
    }
}
