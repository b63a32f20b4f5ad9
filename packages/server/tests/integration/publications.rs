use serde_json::json;

use crate::harness::{TestApp, routes};

#[tokio::test]
async fn chapters_append_after_the_latest_number() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;

    let res = app
        .post_with_token(
            routes::PUBLICATIONS,
            &json!({"kind": "novel", "title": "  The Long Road  ", "description": "A journey."}),
            &alice.token,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["title"], "The Long Road");
    let id = res.body["id"].as_str().unwrap().to_string();

    let latest = app.get_without_token(&routes::latest_chapter(&id)).await;
    assert_eq!(latest.status, 200, "{}", latest.text);
    assert!(latest.body["number"].is_null());

    for title in ["Departure", "Arrival"] {
        let res = app
            .post_with_token(
                &routes::publication_chapters(&id),
                &json!({"title": title, "content": "Once upon a time."}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    let latest = app.get_without_token(&routes::latest_chapter(&id)).await;
    assert_eq!(latest.body["number"], 2);

    let chapters = app.get_without_token(&routes::publication_chapters(&id)).await;
    let titles: Vec<&str> = chapters
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Departure", "Arrival"]);

    let res = app
        .post_with_token(
            &routes::publication_chapters(&id),
            &json!({"number": 2, "title": "Again", "content": "Duplicate."}),
            &alice.token,
        )
        .await;
    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn only_the_owner_changes_a_publication() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let res = app
        .post_with_token(
            routes::PUBLICATIONS,
            &json!({"kind": "manga", "title": "Mine", "description": "Hands off."}),
            &alice.token,
        )
        .await;
    let id = res.body["id"].as_str().unwrap().to_string();
    let path = format!("{}/{id}", routes::PUBLICATIONS);

    let res = app
        .patch_with_token(&path, &json!({"title": "Ours"}), &bob.token)
        .await;
    assert_eq!(res.status, 403);

    let res = app
        .post_with_token(
            &routes::publication_chapters(&id),
            &json!({"title": "Sneaky", "content": "Not allowed."}),
            &bob.token,
        )
        .await;
    assert_eq!(res.status, 403);

    let res = app.delete_with_token(&path, &alice.token).await;
    assert_eq!(res.status, 204);
    let res = app.get_without_token(&path).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;

    let res = app
        .post_with_token(
            routes::PUBLICATIONS,
            &json!({"kind": "tutorial", "title": "   ", "description": "Empty title."}),
            &alice.token,
        )
        .await;

    assert_eq!(res.status, 422);
    assert_eq!(res.body["field"], "title");
}
