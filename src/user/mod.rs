pub use directory::{InMemoryUserDirectory, UserDirectory};

pub mod directory;
