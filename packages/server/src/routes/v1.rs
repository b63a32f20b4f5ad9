use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers::{self, streams};
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::users::update_avatar))
        .layer(handlers::upload_body_limit(1))
        .routes(routes!(handlers::users::me))
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/posts", post_routes(config))
        .nest("/comments", comment_routes())
        .nest("/timeline", timeline_routes())
        .nest("/notifications", notification_routes())
        .nest("/chats", chat_routes())
        .nest("/publications", publication_routes())
        .routes(routes!(handlers::previews::link_previews))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::send_magic_link))
        .routes(routes!(
            handlers::auth::verify_magic_link,
            handlers::auth::follow_magic_link
        ))
        .routes(routes!(handlers::auth::dev_login))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::users::search_users))
        .routes(routes!(handlers::users::get_user))
        .routes(routes!(handlers::users::list_followers))
        .routes(routes!(handlers::users::list_followees))
        .routes(routes!(handlers::users::toggle_follow))
}

fn post_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::posts::list_posts,
            handlers::posts::create_post
        ))
        .layer(handlers::upload_body_limit(config.media.max_attachments))
        .routes(routes!(streams::posts))
        .routes(routes!(
            handlers::posts::get_post,
            handlers::posts::update_post,
            handlers::posts::delete_post
        ))
        .routes(routes!(handlers::posts::toggle_post_reaction))
        .routes(routes!(handlers::posts::toggle_post_subscription))
        .routes(routes!(
            handlers::posts::list_comments,
            handlers::posts::create_comment
        ))
        .routes(routes!(streams::comments))
}

fn comment_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::comments::get_comment,
            handlers::comments::update_comment,
            handlers::comments::delete_comment
        ))
        .routes(routes!(handlers::comments::toggle_comment_reaction))
}

fn timeline_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::timeline::timeline))
        .routes(routes!(streams::timeline))
        .routes(routes!(handlers::timeline::delete_timeline_item))
}

fn notification_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::notifications::list_notifications))
        .routes(routes!(handlers::notifications::has_unread_notifications))
        .routes(routes!(handlers::notifications::read_all_notifications))
        .routes(routes!(handlers::notifications::read_notification))
        .routes(routes!(streams::notifications))
}

fn chat_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::chats::list_chats,
            handlers::chats::create_chat
        ))
        .routes(routes!(handlers::chats::lookup_chat))
        .routes(routes!(handlers::chats::has_unread_chats))
        .routes(routes!(handlers::chats::get_chat))
        .routes(routes!(
            handlers::chats::list_messages,
            handlers::chats::create_message
        ))
        .routes(routes!(streams::messages))
}

fn publication_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::publications::list_publications,
            handlers::publications::create_publication
        ))
        .routes(routes!(
            handlers::publications::get_publication,
            handlers::publications::update_publication,
            handlers::publications::delete_publication
        ))
        .routes(routes!(handlers::publications::latest_chapter))
        .routes(routes!(
            handlers::publications::list_chapters,
            handlers::publications::create_chapter
        ))
        .routes(routes!(
            handlers::publications::get_chapter,
            handlers::publications::update_chapter,
            handlers::publications::delete_chapter
        ))
}
