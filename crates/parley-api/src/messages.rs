use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use parley_auth::Claims;
use parley_db::models::ReactionRow;
use parley_types::api::{
    MarkReadRequest, MessageCreated, MessageCreatedResponse, MessageView, MessagesResponse,
    ReactRequest, ReactionAggregate, SendMessageRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::parse_timestamp;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// `GET /messages/{chat_id}` — one page, anchored at the newest message but
/// returned in chronological order, with reaction aggregates keyed to the
/// caller.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.user_id;
    let limit = query.limit.min(200);
    let offset = query.offset;

    let db = state.clone();
    let (rows, reaction_rows) = tokio::task::spawn_blocking(move || {
        if !db.db.is_member(chat_id, me)? {
            return Err(ApiError::forbidden("Access denied"));
        }

        // Newest-first at the store so offset pages anchor at the tail,
        // then reversed so each page reads oldest-to-newest.
        let mut rows = db.db.messages_page(chat_id, limit, offset)?;
        rows.reverse();

        let message_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let reaction_rows = db.db.reactions_for_messages(&message_ids)?;

        Ok::<_, ApiError>((rows, reaction_rows))
    })
    .await
    .map_err(ApiError::join_error)??;

    let mut aggregates = group_reactions(&reaction_rows, me);

    let messages: Vec<MessageView> = rows
        .into_iter()
        .map(|row| MessageView {
            id: row.id,
            text: row.text,
            message_type: row.message_type,
            media_url: row.media_url,
            media_name: row.media_name,
            media_size: row.media_size,
            is_edited: row.is_edited,
            is_forwarded: row.is_forwarded,
            reply_to_id: row.reply_to_id,
            created_at: parse_timestamp(&row.created_at),
            sender_id: row.sender_id,
            first_name: row.sender_first_name,
            last_name: row.sender_last_name,
            username: row.sender_username,
            avatar_url: row.sender_avatar_url,
            reactions: aggregates.remove(&row.id).unwrap_or_default(),
        })
        .collect();

    Ok(Json(MessagesResponse { messages }))
}

/// `POST /send` — insert plus chat-recency bump, committed together.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    let Some(chat_id) = req.chat_id else {
        return Err(ApiError::bad_request("chat_id and text are required"));
    };
    if text.is_empty() {
        return Err(ApiError::bad_request("chat_id and text are required"));
    }

    let me = claims.user_id;
    let message_type = req.message_type;

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        if !db.db.is_member(chat_id, me)? {
            return Err(ApiError::forbidden("Access denied"));
        }
        Ok::<_, ApiError>(db.db.insert_message(chat_id, me, &text, &message_type)?)
    })
    .await
    .map_err(ApiError::join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(MessageCreatedResponse {
            message: MessageCreated {
                id: row.id,
                chat_id: row.chat_id,
                sender_id: row.sender_id,
                text: row.text,
                message_type: row.message_type,
                created_at: parse_timestamp(&row.created_at),
            },
        }),
    ))
}

/// `POST /react` — toggle the caller's reaction on a message in a chat they
/// belong to. Returns whether the toggle added it.
pub async fn react(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(message_id) = req.message_id else {
        return Err(ApiError::bad_request("message_id and emoji are required"));
    };
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() {
        return Err(ApiError::bad_request("message_id and emoji are required"));
    }

    let me = claims.user_id;
    let db = state.clone();
    let added = tokio::task::spawn_blocking(move || -> Result<bool, ApiError> {
        let chat_id = db
            .db
            .chat_of_message(message_id)?
            .ok_or_else(|| ApiError::not_found("Not found"))?;
        if !db.db.is_member(chat_id, me)? {
            return Err(ApiError::forbidden("Access denied"));
        }
        Ok(db.db.toggle_reaction(message_id, me, &emoji)?)
    })
    .await
    .map_err(ApiError::join_error)??;

    Ok(Json(serde_json::json!({ "added": added })))
}

/// `POST /mark-read` — advance the caller's read marker; never moves it
/// backwards.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(chat_id), Some(message_id)) = (req.chat_id, req.message_id) else {
        return Err(ApiError::bad_request("chat_id and message_id are required"));
    };

    let me = claims.user_id;
    let db = state.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        if !db.db.is_member(chat_id, me)? {
            return Err(ApiError::forbidden("Access denied"));
        }
        Ok(db.db.mark_read(chat_id, me, message_id)?)
    })
    .await
    .map_err(ApiError::join_error)??;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Group raw reaction rows into per-message aggregates: count per emoji and
/// whether `me` is among the reactors. BTreeMap keeps emoji order stable
/// across calls.
fn group_reactions(rows: &[ReactionRow], me: i64) -> HashMap<i64, Vec<ReactionAggregate>> {
    let mut grouped: HashMap<i64, BTreeMap<&str, (i64, bool)>> = HashMap::new();
    for row in rows {
        let entry = grouped
            .entry(row.message_id)
            .or_default()
            .entry(row.emoji.as_str())
            .or_insert((0, false));
        entry.0 += 1;
        if row.user_id == me {
            entry.1 = true;
        }
    }

    grouped
        .into_iter()
        .map(|(message_id, emojis)| {
            let aggregates = emojis
                .into_iter()
                .map(|(emoji, (count, selected))| ReactionAggregate {
                    emoji: emoji.to_string(),
                    count,
                    selected,
                })
                .collect();
            (message_id, aggregates)
        })
        .collect()
}
