use serde_json::{Value, json};

use crate::harness::{TestApp, routes};

fn ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect()
}

mod publishing {
    use super::*;

    #[tokio::test]
    async fn text_post_is_trimmed_and_tagged() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;

        let res = app
            .create_post(&alice, "  Check out #rust and #GoLang!  ")
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["content"], "Check out #rust and #GoLang!");
        assert_eq!(res.body["user"]["username"], "alice");
        assert_eq!(res.body["comments_count"], 0);
        assert_eq!(res.body["subscribed"], true);
        let mut tags: Vec<&str> = res.body["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t.as_str().unwrap())
            .collect();
        tags.sort();
        assert_eq!(tags, ["golang", "rust"]);
    }

    #[tokio::test]
    async fn empty_post_without_images_is_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;

        let res = app.create_post(&alice, "   ").await;

        assert_eq!(res.status, 422);
        assert_eq!(res.body["field"], "content");
    }

    #[tokio::test]
    async fn posts_can_be_filtered_by_tag() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let tagged = app.create_post(&alice, "learning #rust").await;
        app.create_post(&alice, "nothing here").await;

        let res = app
            .get_without_token(&format!("{}?tag=Rust&first=10", routes::POSTS))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(ids(&res.body), [tagged.body["id"].as_str().unwrap()]);
    }

    #[tokio::test]
    async fn only_the_author_may_edit_or_delete() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let bob = app.signup("bob").await;
        let post = app.create_post(&alice, "original").await;
        let id = post.body["id"].as_str().unwrap();

        let res = app
            .patch_with_token(&routes::post(id), &json!({"content": "hijacked"}), &bob.token)
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");

        let res = app
            .patch_with_token(&routes::post(id), &json!({"content": "edited #news"}), &alice.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["content"], "edited #news");
        assert_eq!(res.body["tags"], json!(["news"]));

        let res = app.delete_with_token(&routes::post(id), &bob.token).await;
        assert_eq!(res.status, 403);

        let res = app.delete_with_token(&routes::post(id), &alice.token).await;
        assert_eq!(res.status, 204);

        let res = app.get_without_token(&routes::post(id)).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn reactions_toggle_per_user() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let bob = app.signup("bob").await;
        let post = app.create_post(&alice, "react to me").await;
        let id = post.body["id"].as_str().unwrap();

        let res = app
            .post_with_token(&routes::post_reaction(id), &json!({"emoji": "👍"}), &alice.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let res = app
            .post_with_token(&routes::post_reaction(id), &json!({"emoji": "👍"}), &bob.token)
            .await;
        assert_eq!(res.body, json!([{"emoji": "👍", "count": 2, "reacted": true}]));

        let res = app
            .post_with_token(&routes::post_reaction(id), &json!({"emoji": "👍"}), &alice.token)
            .await;
        assert_eq!(res.body, json!([{"emoji": "👍", "count": 1, "reacted": false}]));

        let res = app
            .post_with_token(&routes::post_reaction(id), &json!({"emoji": "nope"}), &alice.token)
            .await;
        assert_eq!(res.status, 422);
    }
}

mod timeline {
    use super::*;

    #[tokio::test]
    async fn new_post_reaches_every_follower_once() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let mut followers = Vec::new();
        for name in ["bob", "carol", "dave"] {
            let follower = app.signup(name).await;
            app.follow(&follower, &alice).await;
            followers.push(follower);
        }
        let outsider = app.signup("erin").await;

        let post = app.create_post(&alice, "hello followers").await;
        let post_id = post.body["id"].as_str().unwrap();
        app.settle().await;

        for session in followers.iter().chain(std::iter::once(&alice)) {
            let res = app
                .get_with_token(&format!("{}?first=50", routes::TIMELINE), &session.token)
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
            let hits = res.body["items"]
                .as_array()
                .unwrap()
                .iter()
                .filter(|i| i["post"]["id"] == post_id)
                .count();
            assert_eq!(hits, 1, "timeline of {}", session.username);
        }

        let res = app
            .get_with_token(&format!("{}?first=50", routes::TIMELINE), &outsider.token)
            .await;
        assert!(res.body["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hiding_an_item_leaves_the_post() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let post = app.create_post(&alice, "keep me").await;
        let post_id = post.body["id"].as_str().unwrap();

        let feed = app.get_with_token(routes::TIMELINE, &alice.token).await;
        let item_id = feed.body["items"][0]["id"].as_str().unwrap().to_string();

        let res = app
            .delete_with_token(&format!("{}/{item_id}", routes::TIMELINE), &alice.token)
            .await;
        assert_eq!(res.status, 204);

        let feed = app.get_with_token(routes::TIMELINE, &alice.token).await;
        assert!(feed.body["items"].as_array().unwrap().is_empty());
        let res = app.get_without_token(&routes::post(post_id)).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn forward_walk_visits_every_post_once_newest_first() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let mut created = Vec::new();
        for n in 0..7 {
            let res = app.create_post(&alice, &format!("post number {n}")).await;
            created.push(res.body["id"].as_str().unwrap().to_string());
        }

        let mut seen = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let path = match &after {
                Some(cursor) => format!("{}?username=alice&first=3&after={cursor}", routes::POSTS),
                None => format!("{}?username=alice", routes::POSTS),
            };
            let res = app.get_without_token(&path).await;
            assert_eq!(res.status, 200, "{}", res.text);
            seen.extend(ids(&res.body));
            if res.body["page_info"]["has_next_page"] != true {
                break;
            }
            after = res.body["page_info"]["end_cursor"].as_str().map(str::to_owned);
        }

        created.reverse();
        assert_eq!(seen, created);
    }

    #[tokio::test]
    async fn backward_walk_pages_from_the_oldest_end() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let mut created = Vec::new();
        for n in 0..7 {
            let res = app.create_post(&alice, &format!("post number {n}")).await;
            created.push(res.body["id"].as_str().unwrap().to_string());
        }

        let first = app
            .get_without_token(&format!("{}?username=alice&last=3", routes::POSTS))
            .await;
        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(ids(&first.body), [created[2].clone(), created[1].clone(), created[0].clone()]);
        assert_eq!(first.body["page_info"]["has_previous_page"], true);
        assert_eq!(first.body["page_info"]["has_next_page"], false);

        let mut pages = vec![ids(&first.body)];
        let mut before = first.body["page_info"]["start_cursor"].as_str().unwrap().to_string();
        loop {
            let res = app
                .get_without_token(&format!("{}?username=alice&last=3&before={before}", routes::POSTS))
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
            assert_eq!(res.body["page_info"]["has_next_page"], true);
            pages.insert(0, ids(&res.body));
            if res.body["page_info"]["has_previous_page"] != true {
                break;
            }
            before = res.body["page_info"]["start_cursor"].as_str().unwrap().to_string();
        }

        let seen: Vec<String> = pages.into_iter().flatten().collect();
        created.reverse();
        assert_eq!(seen, created);
    }
}

mod comments {
    use super::*;

    #[tokio::test]
    async fn comments_count_follows_creates_and_deletes() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let bob = app.signup("bob").await;
        let post = app.create_post(&alice, "discuss").await;
        let post_id = post.body["id"].as_str().unwrap();

        let first = app
            .post_with_token(&routes::post_comments(post_id), &json!({"content": "first!"}), &bob.token)
            .await;
        assert_eq!(first.status, 201, "{}", first.text);
        app.post_with_token(&routes::post_comments(post_id), &json!({"content": "second"}), &alice.token)
            .await;

        let res = app.get_without_token(&routes::post(post_id)).await;
        assert_eq!(res.body["comments_count"], 2);

        let comment_id = first.body["id"].as_str().unwrap();
        let res = app.delete_with_token(&routes::comment(comment_id), &alice.token).await;
        assert_eq!(res.status, 403);
        let res = app.delete_with_token(&routes::comment(comment_id), &bob.token).await;
        assert_eq!(res.status, 204);

        let res = app.get_without_token(&routes::post(post_id)).await;
        assert_eq!(res.body["comments_count"], 1);
        let list = app
            .get_without_token(&format!("{}?first=10", routes::post_comments(post_id)))
            .await;
        assert_eq!(list.body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commenting_on_a_missing_post_is_not_found() {
        let app = TestApp::spawn().await;
        let bob = app.signup("bob").await;

        let res = app
            .post_with_token(&routes::post_comments("missing"), &json!({"content": "hello?"}), &bob.token)
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn comment_can_be_edited_by_its_author() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let post = app.create_post(&alice, "post").await;
        let post_id = post.body["id"].as_str().unwrap();
        let comment = app
            .post_with_token(&routes::post_comments(post_id), &json!({"content": "typo"}), &alice.token)
            .await;
        let comment_id = comment.body["id"].as_str().unwrap();

        let res = app
            .patch_with_token(&routes::comment(comment_id), &json!({"content": "fixed #typo"}), &alice.token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["content"], "fixed #typo");
        assert_eq!(res.body["tags"], json!(["typo"]));
    }
}

#[tokio::test]
async fn link_previews_reject_empty_requests() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::LINK_PREVIEWS, &json!({"urls": []}))
        .await;

    assert_eq!(res.status, 422);
    assert_eq!(res.body["field"], "urls");
}

#[tokio::test]
async fn link_previews_keep_unreachable_urls_without_metadata() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::LINK_PREVIEWS, &json!({"urls": ["http://127.0.0.1:9/nothing"]}))
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body[0]["url"], "http://127.0.0.1:9/nothing");
    assert!(res.body[0]["preview"].is_null());
}
