pub mod auth;
pub mod chats;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;

pub use auth::{AppState, AppStateInner};

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::ApiError;

/// Assemble the full application router. Everything except `/auth` sits
/// behind the bearer-credential gate.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth", post(auth::auth))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/chats", get(chats::list_chats))
        .route("/messages/{chat_id}", get(messages::get_messages))
        .route("/send", post(messages::send_message))
        .route("/create-chat", post(chats::create_chat))
        .route("/search-users", get(users::search_users))
        .route("/react", post(messages::react))
        .route("/mark-read", post(messages::mark_read))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(|| async { ApiError::not_found("Not found") })
        .method_not_allowed_fallback(|| async { ApiError::method_not_allowed("Method not allowed") })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// SQLite hands timestamps back as naive UTC text, with or without a
/// fractional part. Corrupt values degrade to the epoch rather than failing
/// the whole response.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
