use std::time::Duration;

use serde_json::{Value, json};

use crate::harness::{TestApp, routes};

/// Read an event stream until the first `data:` line and parse its payload.
async fn next_event(res: &mut reqwest::Response) -> Value {
    let mut buf = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), res.chunk())
            .await
            .expect("No event before timeout")
            .expect("Stream failed")
            .expect("Stream ended");
        buf.push_str(&String::from_utf8_lossy(&chunk));
        if let Some(line) = buf.lines().find(|l| l.starts_with("data:")) {
            return serde_json::from_str(line.trim_start_matches("data:").trim())
                .expect("Event payload is not JSON");
        }
    }
}

#[tokio::test]
async fn new_posts_are_streamed_to_anonymous_readers() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;

    let mut stream = app
        .client
        .get(app.url(&format!("{}/stream", routes::POSTS)))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);
    assert!(
        stream.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let res = app.create_post(&alice, "fresh off the press").await;
    assert_eq!(res.status, 201, "{}", res.text);

    let event = next_event(&mut stream).await;
    assert_eq!(event["content"], "fresh off the press");
    assert_eq!(event["user"]["username"], "alice");
}

#[tokio::test]
async fn notification_stream_accepts_query_token() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let mut stream = app
        .client
        .get(app.url(&format!("{}/stream?access_token={}", routes::NOTIFICATIONS, alice.token)))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);

    app.follow(&bob, &alice).await;

    let event = next_event(&mut stream).await;
    assert_eq!(event["kind"], "follow");
    assert_eq!(event["actors"][0]["username"], "bob");
}

#[tokio::test]
async fn notification_stream_requires_a_session() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .get(app.url(&format!("{}/stream", routes::NOTIFICATIONS)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = app
        .client
        .get(app.url(&format!("{}/stream?access_token=garbage", routes::NOTIFICATIONS)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn chat_stream_is_private_to_participants() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let eve = app.signup("eve").await;

    let res = app
        .post_with_token(routes::CHATS, &json!({"user_id": bob.user_id, "content": "hi"}), &alice.token)
        .await;
    let chat_id = res.body["chat"]["id"].as_str().unwrap().to_string();
    let path = format!("{}/stream", routes::chat_messages(&chat_id));

    let res = app
        .client
        .get(app.url(&path))
        .bearer_auth(&eve.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let mut stream = app
        .client
        .get(app.url(&path))
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);

    let res = app
        .post_with_token(&routes::chat_messages(&chat_id), &json!({"content": "hey alice"}), &bob.token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);

    let event = next_event(&mut stream).await;
    assert_eq!(event["content"], "hey alice");
}

#[tokio::test]
async fn comment_stream_for_missing_post_is_not_found() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .get(app.url(&format!("{}/stream", routes::post_comments("nope"))))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
}
