use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use parley_auth::TokenCodec;
use parley_auth::password::hash_password;
use parley_db::Database;
use parley_db::models::UserRow;
use parley_types::api::{AuthRequest, SessionResponse, UserPublic, VerifyResponse};

use crate::error::ApiError;
use crate::middleware::bearer_token;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenCodec,
}

/// `POST /auth` — the action field in the body selects register, login or
/// verify.
pub async fn auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AuthRequest>,
) -> Result<Response, ApiError> {
    match req {
        AuthRequest::Register {
            username,
            password,
            first_name,
            last_name,
            phone,
        } => {
            let username = username.trim().to_lowercase();
            let first_name = first_name.trim().to_string();
            let last_name = none_if_empty(&last_name);
            let phone = none_if_empty(&phone);

            if username.is_empty() || password.is_empty() || first_name.is_empty() {
                return Err(ApiError::bad_request(
                    "Username, password and first_name are required",
                ));
            }
            let length = username.chars().count();
            if !(3..=32).contains(&length) {
                return Err(ApiError::bad_request("Username must be 3-32 characters"));
            }

            let digest = hash_password(&password);
            let db = state.clone();
            let row = tokio::task::spawn_blocking(move || {
                db.db.create_user(
                    &username,
                    &digest,
                    &first_name,
                    last_name.as_deref(),
                    phone.as_deref(),
                )
            })
            .await
            .map_err(ApiError::join_error)??;

            let token = state
                .tokens
                .issue(row.id, &row.username)
                .map_err(|e| ApiError::internal(e.to_string()))?;

            Ok((
                StatusCode::CREATED,
                Json(SessionResponse {
                    token,
                    user: user_public(row),
                }),
            )
                .into_response())
        }

        AuthRequest::Login { username, password } => {
            let username = username.trim().to_lowercase();
            if username.is_empty() || password.is_empty() {
                return Err(ApiError::bad_request("Username and password are required"));
            }

            let digest = hash_password(&password);
            let db = state.clone();
            let row = tokio::task::spawn_blocking(move || -> Result<UserRow, ApiError> {
                // One lookup over both columns: a missing user and a wrong
                // password are the same failure to the caller.
                let mut row = db
                    .db
                    .find_user_by_credentials(&username, &digest)?
                    .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;
                db.db.mark_online(row.id)?;
                row.is_online = true;
                Ok(row)
            })
            .await
            .map_err(ApiError::join_error)??;

            let token = state
                .tokens
                .issue(row.id, &row.username)
                .map_err(|e| ApiError::internal(e.to_string()))?;

            Ok(Json(SessionResponse {
                token,
                user: user_public(row),
            })
            .into_response())
        }

        AuthRequest::Verify => {
            let token =
                bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("No token provided"))?;
            let claims = state
                .tokens
                .verify(token)
                .map_err(|_| ApiError::unauthorized("Invalid token"))?;

            // Re-fetch: a structurally valid token for a deleted user must
            // not authenticate.
            let db = state.clone();
            let row = tokio::task::spawn_blocking(move || db.db.get_user_by_id(claims.user_id))
                .await
                .map_err(ApiError::join_error)??
                .ok_or_else(|| ApiError::unauthorized("User not found"))?;

            Ok(Json(VerifyResponse {
                user: user_public(row),
            })
            .into_response())
        }
    }
}

/// The credential hash stays behind; everything else is public projection.
pub(crate) fn user_public(row: UserRow) -> UserPublic {
    UserPublic {
        id: row.id,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        avatar_url: row.avatar_url,
        bio: row.bio,
        is_online: row.is_online,
    }
}

fn none_if_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
