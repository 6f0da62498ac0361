// Library crate for the room chat server
// This file exposes the public API for integration tests

pub mod config;
pub mod db;
pub mod invitation;
pub mod message;
pub mod presence;
pub mod room;
pub mod session;
pub mod shared;
pub mod user;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use message::{models::MessageModel, repository::MessageRepository};
pub use room::{models::RoomModel, repository::RoomRepository};
pub use session::{Identity, Session};
pub use shared::{AppError, AppState};
pub use websockets::{
    ConnectionCoordinator, ConnectionManager, MessageHandler, MessageType, WebSocketMessage,
};
