use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::shared::{AppError, AppState};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WebSocketQuery {
    pub token: Option<String>,
}

/// Where the bearer token for a socket came from
#[derive(Debug, PartialEq)]
pub enum TokenSource {
    /// Sec-WebSocket-Protocol; must be echoed back in the handshake response
    Protocol(String),
    Query(String),
}

impl TokenSource {
    pub fn token(&self) -> &str {
        match self {
            TokenSource::Protocol(token) | TokenSource::Query(token) => token,
        }
    }
}

/// Picks the token from the Sec-WebSocket-Protocol header, falling back to `?token=`
pub fn extract_token(headers: &HeaderMap, query: &WebSocketQuery) -> Result<TokenSource, AppError> {
    let from_header = headers
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|h| h.to_str().ok())
        .and_then(|protocols| protocols.split(',').next())
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = from_header {
        return Ok(TokenSource::Protocol(token.to_string()));
    }

    query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| TokenSource::Query(token.to_string()))
        .ok_or_else(|| {
            warn!("WebSocket request without a token");
            AppError::Unauthenticated("Missing authentication token".to_string())
        })
}

/// WebSocket endpoint
///
/// GET /ws with the JWT in the Sec-WebSocket-Protocol header or `?token=`.
/// Authentication happens before the upgrade, so every accepted socket has an identity.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<WebSocketQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let source = extract_token(&headers, &query)?;
    let identity = state.authenticator.authenticate(source.token()).await?;

    info!(user_id = %identity.user_id, "WebSocket authentication successful");

    let ws = match source {
        TokenSource::Protocol(token) => ws.protocols([token]),
        TokenSource::Query(_) => ws,
    };

    let coordinator = state.coordinator.clone();
    Ok(ws.on_upgrade(move |socket| coordinator.serve(identity, Box::new(socket))))
}
