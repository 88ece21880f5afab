//! Static bearer-token authentication for mutating routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{errors::AppError, state::AppState};

/// Reject the request unless it carries the configured bearer token.
///
/// When no token is configured, authentication is disabled and every
/// request passes through.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = &state.config.auth_token {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented != Some(format!("Bearer {expected}").as_str()) {
            return Err(AppError::unauthorized("Unauthorized"));
        }
    }
    Ok(next.run(request).await)
}
