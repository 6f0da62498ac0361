// Public API
pub use broadcast::MessageBroadcaster;
pub use connection_manager::{ConnectionManager, InMemoryConnectionManager};
pub use coordinator::ConnectionCoordinator;
pub use handler::websocket_handler;
pub use messages::{ClientEvent, MessageType, WebSocketMessage};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod broadcast;
mod connection_manager;
mod coordinator;
mod handler;
pub mod messages;
mod socket;
