use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::{token::TokenConfig, types::Identity};
use crate::shared::AppError;

/// Verifies a bearer credential and yields the identity behind it
///
/// The core trusts whatever identity this returns; user registration,
/// password checks and token issuance all live behind it.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity, AppError>;
}

/// Authenticator backed by HS256 JWTs
pub struct JwtAuthenticator {
    token_config: TokenConfig,
}

impl JwtAuthenticator {
    pub fn new(token_config: TokenConfig) -> Self {
        Self { token_config }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    #[instrument(skip(self, token))]
    async fn authenticate(&self, token: &str) -> Result<Identity, AppError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            warn!("Empty bearer token");
            return Err(AppError::Unauthenticated(
                "Missing authentication token".to_string(),
            ));
        }

        let claims = self.token_config.validate_token(token)?;
        debug!(user_id = %claims.sub, "Bearer token accepted");

        Ok(Identity::from(claims))
    }
}
