// Public API - what other modules can use
pub use auth::{Authenticator, JwtAuthenticator};
pub use middleware::jwt_auth;
pub use registry::{Session, SessionRegistry};
pub use token::TokenConfig;
pub use types::{Claims, Identity};

// Internal modules
mod auth;
mod middleware;
pub mod registry;
mod token;
mod types;
