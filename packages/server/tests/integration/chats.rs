use serde_json::json;

use crate::harness::{TestApp, routes};

#[tokio::test]
async fn recipient_must_reply_before_the_sender_continues() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": bob.user_id, "content": "hi"}), &alice.token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["chat"]["status"], "pending_sender");
    assert_eq!(res.body["message"]["content"], "hi");
    let chat_id = res.body["chat"]["id"].as_str().unwrap().to_string();

    let bobs_view = app
        .get_with_token(&format!("{}/lookup?user_id={}", routes::CHATS, alice.user_id), &bob.token)
        .await;
    assert_eq!(bobs_view.status, 200, "{}", bobs_view.text);
    assert_eq!(bobs_view.body["status"], "pending_receiver");
    assert_eq!(bobs_view.body["has_unread"], true);

    let res = app
        .post_with_token(&routes::chat_messages(&chat_id), &json!({"content": "hello?"}), &alice.token)
        .await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");

    let res = app
        .post_with_token(&routes::chat_messages(&chat_id), &json!({"content": "hello"}), &bob.token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);

    let alices_view = app
        .get_with_token(&format!("{}/{chat_id}", routes::CHATS), &alice.token)
        .await;
    assert_eq!(alices_view.body["status"], "active");

    let res = app
        .post_with_token(&routes::chat_messages(&chat_id), &json!({"content": "great"}), &alice.token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);

    let messages = app
        .get_with_token(&format!("{}?first=10", routes::chat_messages(&chat_id)), &bob.token)
        .await;
    let contents: Vec<&str> = messages.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["great", "hello", "hi"]);
}

#[tokio::test]
async fn only_one_chat_per_pair() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    app.post_with_token(routes::CHATS, &json!({"user_id": bob.user_id, "content": "hi"}), &alice.token)
        .await;

    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": alice.user_id, "content": "hey"}), &bob.token)
        .await;

    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn outsiders_cannot_read_a_chat() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let mallory = app.signup("mallory").await;
    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": bob.user_id, "content": "secret"}), &alice.token)
        .await;
    let chat_id = res.body["chat"]["id"].as_str().unwrap();

    let res = app
        .get_with_token(&routes::chat_messages(chat_id), &mallory.token)
        .await;

    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn reading_messages_clears_the_unread_flag() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": bob.user_id, "content": "ping"}), &alice.token)
        .await;
    let chat_id = res.body["chat"]["id"].as_str().unwrap();

    let unread = app
        .get_with_token(&format!("{}/has_unread", routes::CHATS), &bob.token)
        .await;
    assert_eq!(unread.body["has_unread"], true);

    app.get_with_token(&routes::chat_messages(chat_id), &bob.token).await;

    let unread = app
        .get_with_token(&format!("{}/has_unread", routes::CHATS), &bob.token)
        .await;
    assert_eq!(unread.body["has_unread"], false);
}

#[tokio::test]
async fn cannot_chat_with_yourself() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;

    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": alice.user_id, "content": "me"}), &alice.token)
        .await;

    assert_eq!(res.status, 422);
}

#[tokio::test]
async fn mutual_followers_start_an_active_chat() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    app.follow(&alice, &bob).await;
    app.follow(&bob, &alice).await;

    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": bob.user_id, "content": "hi"}), &alice.token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["chat"]["status"], "active");
    let chat_id = res.body["chat"]["id"].as_str().unwrap().to_string();

    let bobs_view = app
        .get_with_token(&format!("{}/{chat_id}", routes::CHATS), &bob.token)
        .await;
    assert_eq!(bobs_view.body["status"], "active");

    let res = app
        .post_with_token(&routes::chat_messages(&chat_id), &json!({"content": "no need to wait"}), &alice.token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
}
