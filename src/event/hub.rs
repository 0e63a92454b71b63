use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::EventEnvelope;

/// Identity of one connected staff terminal
pub type SessionId = Uuid;

/// Receiving end of a session's outbound queue
pub type SessionQueue = mpsc::Receiver<Arc<EventEnvelope>>;

#[derive(Debug, Error, PartialEq)]
pub enum HubError {
    #[error("Event hub is not running")]
    Unavailable,
}

/// Result of handing an event to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Accepted,
    /// The intake buffer was full; the event was discarded
    DroppedIntakeFull,
    /// The hub task has stopped
    DroppedHubStopped,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Commands the hub inbox buffers before publishes start being dropped
    pub intake_capacity: usize,
    /// Default outbound queue size for each session
    pub session_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            intake_capacity: 1024,
            session_queue_capacity: 64,
        }
    }
}

enum HubCommand {
    Register {
        session_id: SessionId,
        sender: mpsc::Sender<Arc<EventEnvelope>>,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        session_id: SessionId,
    },
    Publish(Arc<EventEnvelope>),
    ConnectedSessions {
        reply: oneshot::Sender<Vec<SessionId>>,
    },
}

/// Broadcaster owning the live session registry
///
/// The registry lives inside the hub task and nowhere else. Every
/// registration, removal and fan-out goes through the single inbox, so the
/// order in which commands are accepted is the order every session observes.
pub struct Hub {
    sessions: HashMap<SessionId, mpsc::Sender<Arc<EventEnvelope>>>,
    inbox: mpsc::Receiver<HubCommand>,
}

/// Cloneable handle used by workflows and sessions to talk to the hub
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    session_queue_capacity: usize,
}

impl Hub {
    /// Spawns the hub task and returns a handle to it
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (commands, inbox) = mpsc::channel(config.intake_capacity.max(1));

        let hub = Hub {
            sessions: HashMap::new(),
            inbox,
        };

        info!(
            intake_capacity = config.intake_capacity,
            session_queue_capacity = config.session_queue_capacity,
            "Starting event hub"
        );

        let task = tokio::spawn(hub.run());

        let handle = HubHandle {
            commands,
            session_queue_capacity: config.session_queue_capacity.max(1),
        };

        (handle, task)
    }

    async fn run(mut self) {
        while let Some(command) = self.inbox.recv().await {
            match command {
                HubCommand::Register {
                    session_id,
                    sender,
                    ack,
                } => {
                    self.sessions.insert(session_id, sender);
                    info!(
                        session_id = %session_id,
                        connected = self.sessions.len(),
                        "Staff terminal registered"
                    );
                    let _ = ack.send(());
                }
                HubCommand::Unregister { session_id } => {
                    if self.sessions.remove(&session_id).is_some() {
                        info!(
                            session_id = %session_id,
                            connected = self.sessions.len(),
                            "Staff terminal unregistered"
                        );
                    }
                }
                HubCommand::Publish(event) => self.fan_out(event),
                HubCommand::ConnectedSessions { reply } => {
                    let _ = reply.send(self.sessions.keys().copied().collect());
                }
            }
        }

        info!(
            connected = self.sessions.len(),
            "Event hub stopped, closing remaining sessions"
        );
    }

    fn fan_out(&mut self, event: Arc<EventEnvelope>) {
        let mut evicted = Vec::new();

        for (session_id, sender) in &self.sessions {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        session_id = %session_id,
                        event_type = event.event_type(),
                        "Outbound queue full, evicting unresponsive session"
                    );
                    evicted.push(*session_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session_id = %session_id, "Session queue already closed");
                    evicted.push(*session_id);
                }
            }
        }

        // Dropping the sender closes the queue, which ends the session's delivery loop
        for session_id in evicted {
            self.sessions.remove(&session_id);
        }

        debug!(
            event_type = event.event_type(),
            room_number = event.room_number(),
            receivers = self.sessions.len(),
            "Event fanned out"
        );
    }
}

impl HubHandle {
    /// Registers a session with the default queue capacity
    pub async fn register(&self, session_id: SessionId) -> Result<SessionQueue, HubError> {
        self.register_with_capacity(session_id, self.session_queue_capacity)
            .await
    }

    /// Registers a session and waits until the hub has accepted it
    ///
    /// Every publish accepted after this returns reaches the new queue.
    pub async fn register_with_capacity(
        &self,
        session_id: SessionId,
        capacity: usize,
    ) -> Result<SessionQueue, HubError> {
        let (sender, queue) = mpsc::channel(capacity.max(1));
        let (ack, acked) = oneshot::channel();

        self.commands
            .send(HubCommand::Register {
                session_id,
                sender,
                ack,
            })
            .await
            .map_err(|_| HubError::Unavailable)?;

        acked.await.map_err(|_| HubError::Unavailable)?;
        Ok(queue)
    }

    /// Removes a session; unknown or already removed sessions are ignored
    pub async fn unregister(&self, session_id: SessionId) {
        if self
            .commands
            .send(HubCommand::Unregister { session_id })
            .await
            .is_err()
        {
            debug!(session_id = %session_id, "Hub stopped before unregister");
        }
    }

    /// Hands an event to the hub without waiting
    ///
    /// Never blocks: when the intake is full the event is dropped.
    pub fn publish(&self, event: EventEnvelope) -> PublishOutcome {
        let event_type = event.event_type();

        match self.commands.try_send(HubCommand::Publish(Arc::new(event))) {
            Ok(()) => PublishOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(event_type = event_type, "Hub intake full, dropping event");
                PublishOutcome::DroppedIntakeFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(event_type = event_type, "Hub stopped, dropping event");
                PublishOutcome::DroppedHubStopped
            }
        }
    }

    /// Asks the hub which sessions are currently registered
    pub async fn connected_sessions(&self) -> Result<Vec<SessionId>, HubError> {
        let (reply, response) = oneshot::channel();

        self.commands
            .send(HubCommand::ConnectedSessions { reply })
            .await
            .map_err(|_| HubError::Unavailable)?;

        response.await.map_err(|_| HubError::Unavailable)
    }
}
