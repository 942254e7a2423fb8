use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use parley_auth::Claims;
use parley_types::api::{
    ChatCreated, ChatCreatedResponse, ChatSummary, ChatType, ChatsResponse, CreateChatRequest,
    LastMessage,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::parse_timestamp;

/// `GET /chats` — every chat the caller belongs to, most recently active
/// first, with unread counts and the latest message.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.user_id;

    let db = state.clone();
    let (summaries, latest) = tokio::task::spawn_blocking(move || {
        let summaries = db.db.list_chats(me)?;
        // One latest-message lookup per chat; fine at this scale.
        let mut latest = Vec::with_capacity(summaries.len());
        for chat in &summaries {
            latest.push(db.db.latest_message(chat.id)?);
        }
        Ok::<_, ApiError>((summaries, latest))
    })
    .await
    .map_err(ApiError::join_error)??;

    let chats: Vec<ChatSummary> = summaries
        .into_iter()
        .zip(latest)
        .map(|(row, last)| ChatSummary {
            id: row.id,
            chat_type: row.chat_type,
            name: row.name,
            username: row.username,
            description: row.description,
            avatar_url: row.avatar_url,
            is_pinned: row.is_pinned,
            is_muted: row.is_muted,
            members: row.member_count,
            unread_count: row.unread_count,
            last_message: last.map(|m| LastMessage {
                id: m.id,
                text: m.text,
                created_at: parse_timestamp(&m.created_at),
                sender_id: m.sender_id,
                first_name: m.first_name,
                last_name: m.last_name,
            }),
        })
        .collect();

    Ok(Json(ChatsResponse { chats }))
}

/// `POST /create-chat` — chat, owner membership and member rows are one
/// unit of work; a taken handle aborts it whole.
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let username = req.username.trim().to_lowercase();

    if matches!(req.chat_type, ChatType::Group | ChatType::Channel) && name.is_empty() {
        return Err(ApiError::bad_request(
            "Name is required for groups and channels",
        ));
    }

    let name = (!name.is_empty()).then_some(name);
    let username = (!username.is_empty()).then_some(username);
    let me = claims.user_id;
    let chat_type = req.chat_type;
    let member_ids = req.member_ids;

    let db = state.clone();
    let chat = tokio::task::spawn_blocking(move || {
        db.db.create_chat(
            me,
            chat_type.as_str(),
            name.as_deref(),
            username.as_deref(),
            &member_ids,
        )
    })
    .await
    .map_err(ApiError::join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(ChatCreatedResponse {
            chat: ChatCreated {
                id: chat.id,
                chat_type: chat.chat_type,
                name: chat.name,
                username: chat.username,
                created_at: parse_timestamp(&chat.created_at),
            },
        }),
    ))
}
