use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{info, instrument, warn};

use crate::shared::{AppError, AppState};

/// Bearer authentication middleware - validates the Authorization header and adds Identity to the request.
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), session::jwt_auth))
/// Handlers can then extract Extension(identity): Extension<Identity>.
#[instrument(skip(state, req, next))]
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header in request");
            AppError::Unauthenticated("Missing authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Invalid Authorization header format (expected Bearer token)");
        AppError::Unauthenticated("Invalid authorization header format".to_string())
    })?;

    let identity = match state.authenticator.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Authentication failed: {}", e);
            return Err(e);
        }
    };

    info!(
        user_id = %identity.user_id,
        uri = %req.uri(),
        "Authenticated HTTP request"
    );

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
