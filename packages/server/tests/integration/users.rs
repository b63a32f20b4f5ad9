use serde_json::json;

use crate::harness::{TestApp, routes};

#[tokio::test]
async fn toggle_follow_flips_state_and_counts() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let res = app
        .post_with_token(&routes::toggle_follow("bob"), &json!({}), &alice.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["following"], true);
    assert_eq!(res.body["followers_count"], 1);

    let profile = app.get_with_token(&routes::user("bob"), &alice.token).await;
    assert_eq!(profile.body["following"], true);
    assert_eq!(profile.body["me"], false);

    let res = app
        .post_with_token(&routes::toggle_follow("bob"), &json!({}), &alice.token)
        .await;
    assert_eq!(res.body["following"], false);
    assert_eq!(res.body["followers_count"], 0);

    let me = app.get_with_token(routes::ME, &alice.token).await;
    assert_eq!(me.body["following_count"], 0);
    let _ = bob;
}

#[tokio::test]
async fn cannot_follow_yourself() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;

    let res = app
        .post_with_token(&routes::toggle_follow("alice"), &json!({}), &alice.token)
        .await;

    assert_eq!(res.status, 422);
}

#[tokio::test]
async fn followers_are_listed_with_the_viewer_relation() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;
    app.follow(&bob, &alice).await;
    app.follow(&carol, &alice).await;
    app.follow(&bob, &carol).await;

    let res = app
        .get_with_token(&format!("{}?first=10", routes::followers("alice")), &bob.token)
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    let items = res.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let carol_row = items.iter().find(|u| u["username"] == "carol").unwrap();
    assert_eq!(carol_row["following"], true);
    let bob_row = items.iter().find(|u| u["username"] == "bob").unwrap();
    assert_eq!(bob_row["me"], true);
}

#[tokio::test]
async fn user_search_matches_fragments_and_pages_forward() {
    let app = TestApp::spawn().await;
    for name in ["anna", "annabel", "hannah", "zoe"] {
        app.signup(name).await;
    }

    let first = app
        .get_without_token(&format!("{}?search=ANN&first=2", routes::USERS))
        .await;
    assert_eq!(first.status, 200, "{}", first.text);
    let names: Vec<&str> = first.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert_eq!(first.body["page_info"]["has_next_page"], true);

    let cursor = first.body["page_info"]["end_cursor"].as_str().unwrap();
    let second = app
        .get_without_token(&format!("{}?search=ann&first=2&after={cursor}", routes::USERS))
        .await;
    let rest: Vec<&str> = second.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(rest.len(), 1);
    assert_eq!(second.body["page_info"]["has_next_page"], false);

    let mut all: Vec<&str> = names.into_iter().chain(rest).collect();
    all.sort();
    assert_eq!(all, ["anna", "annabel", "hannah"]);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = TestApp::spawn().await;

    let res = app.get_without_token(&routes::user("ghost")).await;

    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn conflicting_page_arguments_are_rejected() {
    let app = TestApp::spawn().await;

    let res = app
        .get_without_token(&format!("{}?first=2&last=2", routes::USERS))
        .await;

    assert_eq!(res.status, 422);
}
