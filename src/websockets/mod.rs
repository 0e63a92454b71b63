// Public API
pub use handler::websocket_handler;
pub use socket::{
    ClientSession, InboundFrame, SessionConfig, SessionError, SessionExit, SessionState,
    SocketWrapper,
};

// Internal modules
mod handler;
mod socket;
