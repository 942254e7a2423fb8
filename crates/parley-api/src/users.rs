use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use parley_auth::Claims;
use parley_types::api::{UserHit, UsersResponse};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /search-users?q=` — case-insensitive substring match over username
/// and first/last name, capped at 20 hits.
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.trim().to_lowercase();
    if q.chars().count() < 2 {
        return Err(ApiError::bad_request("Query must be at least 2 characters"));
    }

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.search_users(&q))
        .await
        .map_err(ApiError::join_error)??;

    let users: Vec<UserHit> = rows
        .into_iter()
        .map(|row| UserHit {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            bio: row.bio,
        })
        .collect();

    Ok(Json(UsersResponse { users }))
}
