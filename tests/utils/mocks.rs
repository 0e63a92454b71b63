#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::future;
use tokio::sync::mpsc;

use oasis::websockets::{InboundFrame, SessionError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Channel-backed stand-in for a staff terminal's WebSocket
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<InboundFrame>,
    /// Loops pongs back into our own inbound stream
    pongs: mpsc::UnboundedSender<InboundFrame>,
    outbound: mpsc::UnboundedSender<String>,
    stalled: bool,
}

/// The terminal side of a [`MockSocket`]
pub struct MockSocketRemote {
    pub inbound: mpsc::UnboundedSender<InboundFrame>,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl MockSocket {
    pub fn new() -> (Self, MockSocketRemote) {
        Self::build(false)
    }

    /// A socket whose sends never complete, like a terminal on a dead link
    pub fn stalled() -> (Self, MockSocketRemote) {
        Self::build(true)
    }

    fn build(stalled: bool) -> (Self, MockSocketRemote) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound: inbound_rx,
                pongs: inbound_tx.clone(),
                outbound: outbound_tx,
                stalled,
            },
            MockSocketRemote {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SessionError> {
        if self.stalled {
            future::pending::<()>().await;
        }
        self.outbound
            .send(message)
            .map_err(|e| SessionError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SessionError> {
        if self.stalled {
            future::pending::<()>().await;
        }
        let _ = self.pongs.send(InboundFrame::Heartbeat);
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<InboundFrame, SessionError> {
        Ok(self.inbound.recv().await.unwrap_or(InboundFrame::Closed))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}
