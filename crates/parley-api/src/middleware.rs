use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and verify the bearer credential, stashing the claims for the
/// handler. Absent, malformed, tampered and expired tokens all get the same
/// response; the distinction stays in the debug log.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        debug!("missing or malformed Authorization header");
        ApiError::unauthorized("Unauthorized")
    })?;

    let claims = state.tokens.verify(token).map_err(|_| {
        debug!("rejected bearer token");
        ApiError::unauthorized("Unauthorized")
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Header-map lookup is case-insensitive by construction.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
