// Public API - what other modules can use
pub use handlers::{create_room, invite_users, list_rooms};
pub use subscribers::{Subscriber, SubscriberRegistry};

// Internal modules
mod handlers;
pub mod locks;
pub mod models;
pub mod repository;
pub mod service;
mod subscribers;
pub mod types;
