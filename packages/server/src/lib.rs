pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hub;
pub mod mailer;
pub mod media;
pub mod models;
pub mod opengraph;
pub mod pagination;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nakama API",
        version = "1.0.0",
        description = "API for the Nakama social network"
    ),
    paths(handlers::images::get_image),
    tags(
        (name = "Auth", description = "Passwordless login with emailed links"),
        (name = "Users", description = "Profiles, avatars and follows"),
        (name = "Posts", description = "Posts, reactions and post subscriptions"),
        (name = "Comments", description = "Comments on posts"),
        (name = "Timeline", description = "Home feed of followed users"),
        (name = "Notifications", description = "Mentions, comments and follows"),
        (name = "Chats", description = "Direct messages between two users"),
        (name = "Publications", description = "Long-form works split into chapters"),
        (name = "Link Previews", description = "OpenGraph metadata for shared links"),
        (name = "Media", description = "Stored images"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(config.max_age))
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes(&state.config))
        .split_for_parts();

    let cors = cors_layer(&state.config.server.cors);
    router
        .route("/img/{bucket}/{*key}", get(handlers::images::get_image))
        .route(
            "/api-docs/openapi.json",
            get({
                let api = api.clone();
                move || async move { axum::Json(api) }
            }),
        )
        .with_state(state)
        .merge(Scalar::with_url("/scalar", api))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
