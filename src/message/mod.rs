// Public API - what other modules can use
pub use handlers::list_messages;
pub use models::{FileAttachment, MessageContent, MessageModel, ReadOutcome};

// Internal modules
mod handlers;
pub mod models;
pub mod pipeline;
pub mod receipts;
pub mod repository;
