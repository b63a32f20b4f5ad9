use serde_json::{Value, json};

use crate::harness::{Session, TestApp, routes};

async fn inbox(app: &TestApp, session: &Session) -> Vec<Value> {
    let res = app
        .get_with_token(&format!("{}?first=50", routes::NOTIFICATIONS), &session.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    res.body["items"].as_array().unwrap().clone()
}

fn actor_names(notification: &Value) -> Vec<String> {
    let mut names: Vec<String> = notification["actors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["username"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn follows_coalesce_until_the_notification_is_read() {
    let app = TestApp::spawn().await;
    let carol = app.signup("carol").await;
    let dave = app.signup("dave").await;
    let eve = app.signup("eve").await;
    let frank = app.signup("frank").await;

    app.follow(&carol, &dave).await;
    app.settle().await;
    let items = inbox(&app, &dave).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "follow");
    assert_eq!(actor_names(&items[0]), ["carol"]);

    app.follow(&eve, &dave).await;
    app.settle().await;
    let items = inbox(&app, &dave).await;
    assert_eq!(items.len(), 1);
    assert_eq!(actor_names(&items[0]), ["carol", "eve"]);
    assert_eq!(items[0]["actors"][0]["username"], "eve");

    let id = items[0]["id"].as_str().unwrap();
    let res = app
        .post_with_token(&format!("{}/{id}/read", routes::NOTIFICATIONS), &json!({}), &dave.token)
        .await;
    assert_eq!(res.status, 204);

    app.follow(&frank, &dave).await;
    app.settle().await;
    let items = inbox(&app, &dave).await;
    assert_eq!(items.len(), 2);
    assert_eq!(actor_names(&items[0]), ["frank"]);
    assert!(items[0]["read_at"].is_null());
    assert!(!items[1]["read_at"].is_null());
}

#[tokio::test]
async fn refollowing_does_not_repeat_the_actor() {
    let app = TestApp::spawn().await;
    let dave = app.signup("dave").await;
    let eve = app.signup("eve").await;

    app.follow(&eve, &dave).await;
    app.post_with_token(&routes::toggle_follow("dave"), &json!({}), &eve.token)
        .await;
    app.follow(&eve, &dave).await;
    app.settle().await;

    let items = inbox(&app, &dave).await;
    assert_eq!(items.len(), 1);
    assert_eq!(actor_names(&items[0]), ["eve"]);
}

#[tokio::test]
async fn mentions_notify_existing_users_except_the_author() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let john = app.signup("john").await;

    let post = app
        .create_post(&alice, "Hey @john, cc @alice and @nobody")
        .await;
    assert_eq!(post.status, 201, "{}", post.text);
    app.settle().await;

    let items = inbox(&app, &john).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "post_mention");
    assert_eq!(items[0]["post_id"], post.body["id"]);
    assert_eq!(actor_names(&items[0]), ["alice"]);
    assert!(inbox(&app, &alice).await.is_empty());
}

#[tokio::test]
async fn subscribers_hear_about_new_comments() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let post = app.create_post(&alice, "what do you think?").await;
    let post_id = post.body["id"].as_str().unwrap();

    app.post_with_token(&routes::post_comments(post_id), &json!({"content": "nice"}), &bob.token)
        .await;
    app.settle().await;

    let items = inbox(&app, &alice).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "comment");
    assert_eq!(items[0]["post_id"], post_id);
    assert!(inbox(&app, &bob).await.is_empty());

    let unread = app
        .get_with_token(routes::NOTIFICATIONS_HAS_UNREAD, &alice.token)
        .await;
    assert_eq!(unread.body["has_unread"], true);

    let res = app
        .post_with_token(&format!("{}/read_all", routes::NOTIFICATIONS), &json!({}), &alice.token)
        .await;
    assert_eq!(res.status, 204);
    let unread = app
        .get_with_token(routes::NOTIFICATIONS_HAS_UNREAD, &alice.token)
        .await;
    assert_eq!(unread.body["has_unread"], false);
}

#[tokio::test]
async fn unsubscribed_author_is_not_notified() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let post = app.create_post(&alice, "quiet please").await;
    let post_id = post.body["id"].as_str().unwrap();

    let res = app
        .post_with_token(&format!("{}/toggle_subscription", routes::post(post_id)), &json!({}), &alice.token)
        .await;
    assert_eq!(res.body["subscribed"], false);

    app.post_with_token(&routes::post_comments(post_id), &json!({"content": "hi"}), &bob.token)
        .await;
    app.settle().await;

    assert!(inbox(&app, &alice).await.is_empty());
}

#[tokio::test]
async fn reading_someone_elses_notification_is_not_found() {
    let app = TestApp::spawn().await;
    let carol = app.signup("carol").await;
    let dave = app.signup("dave").await;
    app.follow(&carol, &dave).await;
    app.settle().await;
    let id = inbox(&app, &dave).await[0]["id"].as_str().unwrap().to_string();

    let res = app
        .post_with_token(&format!("{}/{id}/read", routes::NOTIFICATIONS), &json!({}), &carol.token)
        .await;

    assert_eq!(res.status, 404);
}
