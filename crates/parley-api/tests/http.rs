//! End-to-end tests driving the assembled router over an in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use parley_api::{AppState, AppStateInner, router};
use parley_auth::TokenCodec;
use parley_db::Database;

fn app() -> Router {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        tokens: TokenCodec::new("test-secret"),
    });
    router(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(path: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Register a user and hand back (token, user id).
async fn register(app: &Router, username: &str, first_name: &str) -> (String, i64) {
    let (status, body) = send(
        app,
        post_json(
            "/auth",
            None,
            json!({
                "action": "register",
                "username": username,
                "password": "pw1",
                "first_name": first_name,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_i64().unwrap(),
    )
}

async fn create_group(app: &Router, token: &str, name: &str, member_ids: &[i64]) -> i64 {
    let (status, body) = send(
        app,
        post_json(
            "/create-chat",
            Some(token),
            json!({ "type": "group", "name": name, "member_ids": member_ids }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create-chat: {body}");
    body["chat"]["id"].as_i64().unwrap()
}

async fn send_text(app: &Router, token: &str, chat_id: i64, text: &str) -> i64 {
    let (status, body) = send(
        app,
        post_json(
            "/send",
            Some(token),
            json!({ "chat_id": chat_id, "text": text }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "send: {body}");
    body["message"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn register_then_login_then_verify() {
    let app = app();
    let (token, user_id) = register(&app, "alice", "Alice").await;

    // The register token authenticates a verify call.
    let (status, body) = send(
        &app,
        post_json("/auth", Some(&token), json!({ "action": "verify" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"].as_i64(), Some(user_id));
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password_hash").is_none());

    // Handle is normalized, so a re-register under different casing collides.
    let (status, body) = send(
        &app,
        post_json(
            "/auth",
            None,
            json!({
                "action": "register",
                "username": "  ALICE ",
                "password": "pw2",
                "first_name": "Alice",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username already exists");

    let (status, body) = send(
        &app,
        post_json(
            "/auth",
            None,
            json!({ "action": "login", "username": "alice", "password": "pw1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["is_online"], true);

    let (status, body) = send(
        &app,
        post_json(
            "/auth",
            None,
            json!({ "action": "login", "username": "alice", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn register_validation() {
    let app = app();

    let (status, body) = send(
        &app,
        post_json(
            "/auth",
            None,
            json!({ "action": "register", "username": "al", "password": "pw", "first_name": "Al" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username must be 3-32 characters");

    let (status, body) = send(
        &app,
        post_json(
            "/auth",
            None,
            json!({ "action": "register", "username": "alice", "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username, password and first_name are required");
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = app();

    for req in [
        get("/chats", None),
        get("/chats", Some("garbage.token.here")),
        post_json("/send", None, json!({ "chat_id": 1, "text": "hi" })),
    ] {
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn chat_list_tracks_unread_and_last_message() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    let (bob, bob_id) = register(&app, "bob", "Bob").await;
    let chat = create_group(&app, &alice, "devs", &[bob_id]).await;

    send_text(&app, &alice, chat, "hello").await;
    let m2 = send_text(&app, &alice, chat, "world").await;

    // Bob sees two unread and the latest message; the sender sees none.
    let (status, body) = send(&app, get("/chats", Some(&bob))).await;
    assert_eq!(status, StatusCode::OK);
    let entry = &body["chats"][0];
    assert_eq!(entry["id"].as_i64(), Some(chat));
    assert_eq!(entry["members"], 2);
    assert_eq!(entry["unread_count"], 2);
    assert_eq!(entry["last_message"]["text"], "world");
    assert_eq!(entry["last_message"]["first_name"], "Alice");

    let (_, body) = send(&app, get("/chats", Some(&alice))).await;
    assert_eq!(body["chats"][0]["unread_count"], 0);

    // Acknowledging the newest message clears Bob's count.
    let (status, body) = send(
        &app,
        post_json(
            "/mark-read",
            Some(&bob),
            json!({ "chat_id": chat, "message_id": m2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = send(&app, get("/chats", Some(&bob))).await;
    assert_eq!(body["chats"][0]["unread_count"], 0);
}

#[tokio::test]
async fn message_pages_read_chronologically() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    let chat = create_group(&app, &alice, "notes", &[]).await;

    let ids: Vec<i64> = {
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(send_text(&app, &alice, chat, &format!("m{i}")).await);
        }
        ids
    };

    let (status, body) = send(
        &app,
        get(&format!("/messages/{chat}?limit=2&offset=0"), Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page: Vec<i64> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(page, vec![ids[3], ids[4]]);

    let (_, body) = send(
        &app,
        get(&format!("/messages/{chat}?limit=2&offset=2"), Some(&alice)),
    )
    .await;
    let page: Vec<i64> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(page, vec![ids[1], ids[2]]);
}

#[tokio::test]
async fn reactions_aggregate_per_caller() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    let (bob, bob_id) = register(&app, "bob", "Bob").await;
    let chat = create_group(&app, &alice, "devs", &[bob_id]).await;
    let message = send_text(&app, &alice, chat, "hello").await;

    for (token, emoji) in [(&alice, "😀"), (&bob, "😀"), (&alice, "👍")] {
        let (status, body) = send(
            &app,
            post_json(
                "/react",
                Some(token),
                json!({ "message_id": message, "emoji": emoji }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], true);
    }

    let (_, body) = send(&app, get(&format!("/messages/{chat}"), Some(&alice))).await;
    let reactions = body["messages"][0]["reactions"].as_array().unwrap();
    let find = |emoji: &str| {
        reactions
            .iter()
            .find(|r| r["emoji"] == emoji)
            .unwrap_or_else(|| panic!("no aggregate for {emoji}"))
    };
    assert_eq!(find("😀")["count"], 2);
    assert_eq!(find("😀")["selected"], true);
    assert_eq!(find("👍")["count"], 1);
    assert_eq!(find("👍")["selected"], true);

    // Same aggregates through Bob's eyes.
    let (_, body) = send(&app, get(&format!("/messages/{chat}"), Some(&bob))).await;
    let reactions = body["messages"][0]["reactions"].as_array().unwrap();
    let smile = reactions.iter().find(|r| r["emoji"] == "😀").unwrap();
    assert_eq!(smile["count"], 2);
    assert_eq!(smile["selected"], true);
    let thumb = reactions.iter().find(|r| r["emoji"] == "👍").unwrap();
    assert_eq!(thumb["selected"], false);

    // Toggling again removes Alice's smile.
    let (_, body) = send(
        &app,
        post_json(
            "/react",
            Some(&alice),
            json!({ "message_id": message, "emoji": "😀" }),
        ),
    )
    .await;
    assert_eq!(body["added"], false);

    let (_, body) = send(&app, get(&format!("/messages/{chat}"), Some(&alice))).await;
    let reactions = body["messages"][0]["reactions"].as_array().unwrap();
    let smile = reactions.iter().find(|r| r["emoji"] == "😀").unwrap();
    assert_eq!(smile["count"], 1);
    assert_eq!(smile["selected"], false);
}

#[tokio::test]
async fn outsiders_are_forbidden_and_leave_no_trace() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    let (carol, _) = register(&app, "carol", "Carol").await;
    let chat = create_group(&app, &alice, "private", &[]).await;
    send_text(&app, &alice, chat, "secret").await;

    let (status, body) = send(
        &app,
        post_json(
            "/send",
            Some(&carol),
            json!({ "chat_id": chat, "text": "intrusion" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");

    let (status, _) = send(&app, get(&format!("/messages/{chat}"), Some(&carol))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The rejected send left no message behind.
    let (_, body) = send(&app, get(&format!("/messages/{chat}"), Some(&alice))).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["text"], "secret");
}

#[tokio::test]
async fn send_requires_chat_and_text() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    let chat = create_group(&app, &alice, "notes", &[]).await;

    for body in [
        json!({ "text": "hi" }),
        json!({ "chat_id": chat, "text": "   " }),
    ] {
        let (status, resp) = send(&app, post_json("/send", Some(&alice), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "chat_id and text are required");
    }
}

#[tokio::test]
async fn create_chat_validates_and_detects_handle_conflicts() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    let (bob, _) = register(&app, "bob", "Bob").await;

    let (status, body) = send(
        &app,
        post_json("/create-chat", Some(&alice), json!({ "type": "group" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name is required for groups and channels");

    let (status, _) = send(
        &app,
        post_json(
            "/create-chat",
            Some(&alice),
            json!({ "type": "channel", "name": "News", "username": "daily" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        post_json(
            "/create-chat",
            Some(&bob),
            json!({ "type": "channel", "name": "Other", "username": "DAILY" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username already exists");
}

#[tokio::test]
async fn user_search_is_gated_and_validated() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;
    register(&app, "bob", "Bobby").await;

    let (status, _) = send(&app, get("/search-users?q=bo", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/search-users?q=b", Some(&alice))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Query must be at least 2 characters");

    let (status, body) = send(&app, get("/search-users?q=bo", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "bob");
    assert!(users[0].get("phone").is_none());
}

#[tokio::test]
async fn unknown_routes_and_methods_keep_the_envelope() {
    let app = app();
    let (alice, _) = register(&app, "alice", "Alice").await;

    let (status, body) = send(&app, get("/nope", Some(&alice))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, body) = send(&app, get("/send", Some(&alice))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}
