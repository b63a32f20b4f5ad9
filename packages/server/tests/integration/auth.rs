use serde_json::json;

use crate::harness::{REDIRECT_URI, TestApp, routes, test_config};

mod magic_link {
    use super::*;

    #[tokio::test]
    async fn new_user_signs_up_with_a_username() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;

        let res = app.get_with_token(routes::ME, &alice.token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["email"], "alice@example.org");
        assert_eq!(res.body["me"], true);
    }

    #[tokio::test]
    async fn code_cannot_be_used_twice() {
        let app = TestApp::spawn().await;
        app.signup("alice").await;
        let email = "alice@example.org";
        app.post_without_token(
            routes::SEND_MAGIC_LINK,
            &json!({"email": email, "redirect_uri": REDIRECT_URI}),
        )
        .await;
        let code = app.last_code(email);
        let body = json!({"email": email, "code": code});

        let first = app.post_without_token(routes::VERIFY_MAGIC_LINK, &body).await;
        assert_eq!(first.status, 200, "{}", first.text);

        let second = app.post_without_token(routes::VERIFY_MAGIC_LINK, &body).await;
        assert_eq!(second.status, 404);
        assert_eq!(second.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn unknown_email_without_username_keeps_the_code() {
        let app = TestApp::spawn().await;
        let email = "new@example.org";
        app.post_without_token(
            routes::SEND_MAGIC_LINK,
            &json!({"email": email, "redirect_uri": REDIRECT_URI}),
        )
        .await;
        let code = app.last_code(email);

        let res = app
            .post_without_token(routes::VERIFY_MAGIC_LINK, &json!({"email": email, "code": code}))
            .await;
        assert_eq!(res.status, 404);

        let res = app
            .post_without_token(
                routes::VERIFY_MAGIC_LINK,
                &json!({"email": email, "code": code, "username": "newcomer"}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["user"]["username"], "newcomer");
    }

    #[tokio::test]
    async fn foreign_redirect_uri_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SEND_MAGIC_LINK,
                &json!({"email": "alice@example.org", "redirect_uri": "https://evil.example/"}),
            )
            .await;

        assert_eq!(res.status, 422);
        assert_eq!(res.body["code"], "INVALID_ARGUMENT");
        assert_eq!(res.body["field"], "redirect_uri");
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn update_email_requires_a_session() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SEND_MAGIC_LINK,
                &json!({
                    "email": "alice@example.org",
                    "redirect_uri": REDIRECT_URI,
                    "update_email": true,
                }),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn update_email_moves_the_account_to_the_new_address() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;
        let new_email = "alice@new.example.org";

        let res = app
            .post_with_token(
                routes::SEND_MAGIC_LINK,
                &json!({"email": new_email, "redirect_uri": REDIRECT_URI, "update_email": true}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let code = app.last_code(new_email);
        let res = app
            .post_without_token(routes::VERIFY_MAGIC_LINK, &json!({"email": new_email, "code": code}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["user"]["id"], alice.user_id.as_str());
        assert_eq!(res.body["user"]["email"], new_email);
    }

    #[tokio::test]
    async fn emailed_link_redirects_with_the_token_in_the_fragment() {
        let app = TestApp::spawn().await;
        app.signup("alice").await;
        let email = "alice@example.org";
        app.post_without_token(
            routes::SEND_MAGIC_LINK,
            &json!({"email": email, "redirect_uri": REDIRECT_URI}),
        )
        .await;
        let code = app.last_code(email);

        let url = reqwest::Url::parse_with_params(
            &app.url(routes::VERIFY_MAGIC_LINK),
            &[("email", email), ("code", code.as_str()), ("redirect_uri", REDIRECT_URI)],
        )
        .unwrap();
        let res = app.client.get(url).send().await.unwrap();

        assert_eq!(res.status().as_u16(), 303);
        let location = res.headers()["location"].to_str().unwrap();
        assert!(location.starts_with(REDIRECT_URI), "{location}");
        assert!(location.contains("#token="), "{location}");
    }

    #[tokio::test]
    async fn failed_delivery_is_an_internal_error() {
        let app = TestApp::spawn().await;
        app.mailer.set_failing(true);

        let res = app
            .post_without_token(
                routes::SEND_MAGIC_LINK,
                &json!({"email": "alice@example.org", "redirect_uri": REDIRECT_URI}),
            )
            .await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "INTERNAL_ERROR");
    }
}

mod sessions {
    use super::*;

    #[tokio::test]
    async fn dev_login_opens_a_session_for_an_existing_user() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice").await;

        let res = app
            .post_without_token(routes::DEV_LOGIN, &json!({"email": "ALICE@example.org"}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["user"]["id"], alice.user_id.as_str());
    }

    #[tokio::test]
    async fn dev_login_can_be_disabled() {
        let mut config = test_config();
        config.auth.disable_dev_login = true;
        let app = TestApp::spawn_with(config).await;
        app.signup("alice").await;

        let res = app
            .post_without_token(routes::DEV_LOGIN, &json!({"email": "alice@example.org"}))
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ME).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::ME, "not-a-token").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn bad_token_is_rejected_on_public_reads_too() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::USERS, "not-a-token").await;

        assert_eq!(res.status, 401);
    }
}
