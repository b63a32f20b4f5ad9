use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;

use common::storage::{BlobStore, FilesystemBlobStore, ensure_public_bucket};
use nakama::config::AppConfig;
use nakama::extractors::auth::AuthUser;
use nakama::mailer::MemorySender;
use nakama::service::Service;
use nakama::state::AppState;

pub const TOKEN_KEY: &str = "integration-test-signing-key-0123456789";
pub const REDIRECT_URI: &str = "http://localhost:4444/welcome";

pub mod routes {
    pub const SEND_MAGIC_LINK: &str = "/api/v1/auth/send_magic_link";
    pub const VERIFY_MAGIC_LINK: &str = "/api/v1/auth/verify_magic_link";
    pub const DEV_LOGIN: &str = "/api/v1/auth/dev_login";
    pub const ME: &str = "/api/v1/me";
    pub const USERS: &str = "/api/v1/users";
    pub const POSTS: &str = "/api/v1/posts";
    pub const TIMELINE: &str = "/api/v1/timeline";
    pub const NOTIFICATIONS: &str = "/api/v1/notifications";
    pub const NOTIFICATIONS_HAS_UNREAD: &str = "/api/v1/notifications/has_unread";
    pub const CHATS: &str = "/api/v1/chats";
    pub const PUBLICATIONS: &str = "/api/v1/publications";
    pub const LINK_PREVIEWS: &str = "/api/v1/link_previews";

    pub fn user(username: &str) -> String {
        format!("/api/v1/users/{username}")
    }

    pub fn toggle_follow(username: &str) -> String {
        format!("/api/v1/users/{username}/toggle_follow")
    }

    pub fn followers(username: &str) -> String {
        format!("/api/v1/users/{username}/followers")
    }

    pub fn post(id: &str) -> String {
        format!("/api/v1/posts/{id}")
    }

    pub fn post_reaction(id: &str) -> String {
        format!("/api/v1/posts/{id}/toggle_reaction")
    }

    pub fn post_comments(id: &str) -> String {
        format!("/api/v1/posts/{id}/comments")
    }

    pub fn comment(id: &str) -> String {
        format!("/api/v1/comments/{id}")
    }

    pub fn chat_messages(id: &str) -> String {
        format!("/api/v1/chats/{id}/messages")
    }

    pub fn publication_chapters(id: &str) -> String {
        format!("/api/v1/publications/{id}/chapters")
    }

    pub fn latest_chapter(id: &str) -> String {
        format!("/api/v1/publications/{id}/chapters/latest")
    }
}

/// A signed-in test user.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

impl Session {
    pub fn auth(&self) -> AuthUser {
        AuthUser::new(self.user_id.clone())
    }
}

/// A running test server backed by in-memory SQLite and a temporary
/// filesystem blob store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub service: Arc<Service>,
    pub mailer: Arc<MemorySender>,
    _blobs: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            text,
            body,
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::defaults().expect("default configuration");
    config.auth.token_key = TOKEN_KEY.to_string();
    config.database.url = "memory".to_string();
    config
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Self {
        let blobs_dir = TempDir::new().expect("Failed to create blob dir");
        let blobs: Arc<dyn BlobStore> = Arc::new(
            FilesystemBlobStore::new(blobs_dir.path().to_path_buf())
                .await
                .expect("Failed to open blob store"),
        );
        for bucket in [&config.storage.media_bucket, &config.storage.avatars_bucket] {
            ensure_public_bucket(blobs.as_ref(), bucket)
                .await
                .expect("Failed to create bucket");
        }

        let db = nakama::database::init_db(&config.database.url)
            .await
            .expect("Failed to initialize database");
        let mailer = Arc::new(MemorySender::new());
        let service = Service::new(config, db, blobs, mailer.clone()).expect("Failed to build service");

        let state = AppState::new(service);
        let service = state.service.clone();
        let app = nakama::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap(),
            service,
            mailer,
            _blobs: blobs_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait for fan-out, notifications and other background work.
    pub async fn settle(&self) {
        self.service.background().wait_idle().await;
    }

    /// Code from the most recent magic link sent to `email`.
    pub fn last_code(&self, email: &str) -> String {
        let mail = self
            .mailer
            .sent()
            .into_iter()
            .rev()
            .find(|m| m.to == email)
            .expect("no mail sent to address");
        let link = mail
            .text
            .lines()
            .find(|l| l.starts_with("http"))
            .expect("mail without link");
        Url::parse(link)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .expect("link without code")
    }

    /// Sign up through the magic link flow.
    pub async fn signup(&self, username: &str) -> Session {
        let email = format!("{username}@example.org");
        let res = self
            .post_without_token(
                routes::SEND_MAGIC_LINK,
                &json!({"email": email, "redirect_uri": REDIRECT_URI}),
            )
            .await;
        assert_eq!(res.status, 204, "send_magic_link failed: {}", res.text);

        let code = self.last_code(&email);
        let res = self
            .post_without_token(
                routes::VERIFY_MAGIC_LINK,
                &json!({"email": email, "code": code, "username": username}),
            )
            .await;
        assert_eq!(res.status, 200, "verify_magic_link failed: {}", res.text);

        Session {
            token: res.body["token"].as_str().unwrap().to_string(),
            user_id: res.body["user"]["id"].as_str().unwrap().to_string(),
            username: username.to_string(),
        }
    }

    pub async fn follow(&self, follower: &Session, followee: &Session) {
        let res = self
            .post_with_token(&routes::toggle_follow(&followee.username), &json!({}), &follower.token)
            .await;
        assert_eq!(res.status, 200, "toggle_follow failed: {}", res.text);
        assert_eq!(res.body["following"], true);
    }

    /// Publish a text-only post through the multipart endpoint.
    pub async fn create_post(&self, session: &Session, content: &str) -> TestResponse {
        let form = reqwest::multipart::Form::new().text("content", content.to_string());
        let res = self
            .client
            .post(self.url(routes::POSTS))
            .header("Authorization", format!("Bearer {}", session.token))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart request");
        TestResponse::from_response(res).await
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");
        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");
        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");
        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");
        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");
        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");
        TestResponse::from_response(res).await
    }
}
