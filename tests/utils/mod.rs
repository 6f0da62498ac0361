pub mod actions;
pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use actions::{invite_frame, join_frame, mark_read_frame, send_frame};
#[allow(unused_imports)]
pub use assertions::{MessageAssertion, MessageContent};
#[allow(unused_imports)]
pub use mocks::{
    FailingMessageRepository, FlakyRoomRepository, GatedMessageRepository, MockConnectionManager,
    ScriptedSocket,
};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
