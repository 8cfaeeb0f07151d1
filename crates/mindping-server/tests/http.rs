mod common;

use std::net::SocketAddr;

use reqwest::StatusCode;
use serde_json::{Value, json};

use mindping_types::events::ServerFrame;
use mindping_types::models::MessageKind;

use common::{connect_as, next_frame, spawn_server};

async fn register(client: &reqwest::Client, addr: SocketAddr, username: &str) -> (i64, String) {
    let resp = client
        .post(format!("http://{}/api/register", addr))
        .json(&json!({ "username": username, "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = resp.json().await.unwrap();
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (addr, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    for path in ["/api/messages", "/api/users/find/alice", "/api/user"] {
        let resp = client
            .get(format!("http://{}{}", addr, path))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Not authenticated");
    }

    let resp = client
        .post(format!("http://{}/api/messages/1/seen", addr))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_duplicate_names() {
    let (addr, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let (id, token) = register(&client, addr, "Alice").await;

    let resp = client
        .post(format!("http://{}/api/register", addr))
        .json(&json!({ "username": "alice", "password": "another one" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .post(format!("http://{}/api/register", addr))
        .json(&json!({ "username": "zed", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("http://{}/api/login", addr))
        .json(&json!({ "username": "alice", "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("http://{}/api/login", addr))
        .json(&json!({ "username": "Alice", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["id"], id);
    assert!(body["user"].get("password").is_none());
    assert!(body["user"]["avatar"].as_str().unwrap().starts_with("/avatars/avatar-"));

    let me: Value = client
        .get(format!("http://{}/api/user", addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "Alice");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_for_one_name_get_a_single_winner() {
    let (addr, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let attempts = (0..16).map(|i| {
        let client = client.clone();
        let username = if i % 2 == 0 { "racer" } else { "RACER" };
        async move {
            client
                .post(format!("http://{}/api/register", addr))
                .json(&json!({ "username": username, "password": "correct horse" }))
                .send()
                .await
                .unwrap()
                .status()
        }
    });
    let statuses = futures_util::future::join_all(attempts).await;

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(created, 1, "{:?}", statuses);
    assert_eq!(conflicts, 15, "{:?}", statuses);
}

#[tokio::test]
async fn find_user_is_case_insensitive_and_hides_self() {
    let (addr, _state) = spawn_server().await;
    let client = reqwest::Client::new();
    let (_alice, alice_token) = register(&client, addr, "alice").await;
    let (bob, _) = register(&client, addr, "Bobby").await;

    let resp = client
        .get(format!("http://{}/api/users/find/bobby", addr))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let found: Value = resp.json().await.unwrap();
    assert_eq!(found["id"], bob);
    assert_eq!(found["username"], "Bobby");
    assert!(found.get("password").is_none());

    let resp = client
        .get(format!("http://{}/api/users/find/ALICE", addr))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("http://{}/api/users/find/nobody", addr))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let results: Value = client
        .get(format!("http://{}/api/users/search?q=b", addr))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["username"], "Bobby");
}

#[tokio::test]
async fn history_and_mark_as_seen() {
    let (addr, state) = spawn_server().await;
    let client = reqwest::Client::new();
    let (alice, alice_token) = register(&client, addr, "alice").await;
    let (bob, bob_token) = register(&client, addr, "bob").await;

    let first = state.db.create_message(alice, bob, MessageKind::Thought, "one").unwrap();
    let second = state.db.create_message(bob, alice, MessageKind::Emoticon, "🙂").unwrap();

    let history: Value = client
        .get(format!("http://{}/api/messages", addr))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<i64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let seen_url = |id: &str| format!("http://{}/api/messages/{}/seen", addr, id);

    let resp = client.post(seen_url("abc")).bearer_auth(&bob_token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // The sender cannot mark the recipient's message.
    let body: Value = client
        .post(seen_url(&first.id.to_string()))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["unseenCount"], 1);
    assert_eq!(state.db.get_unseen_count(bob).unwrap(), 1);

    // Bob has a live channel; it hears about the new count.
    let (mut b, count) = connect_as(addr, bob).await;
    assert_eq!(count, 1);

    for _ in 0..2 {
        let resp = client
            .post(seen_url(&first.id.to_string()))
            .bearer_auth(&bob_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "unseenCount": 0 }));
        assert_eq!(next_frame(&mut b).await, ServerFrame::Notifications { count: 0 });
    }

    let resp = client.post(seen_url("9999")).bearer_auth(&bob_token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert!(state.db.get_message(first.id).unwrap().unwrap().seen);
}
