use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use tracing::{info, warn};

use crate::entity::*;

/// In-process database used when the configured URL is `memory`.
pub const MEMORY_URL: &str = "sqlite::memory:";

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let url = if db_url == "memory" { MEMORY_URL } else { db_url };
    let mut opt = ConnectOptions::new(url.to_owned());

    if url.starts_with("sqlite:") {
        // Every SQLite in-memory connection is a separate database.
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(100).min_connections(5);
    }
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    create_schema(&db).await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

/// Create every table that does not exist yet.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, follow::Entity).await?;
    create_table(db, post::Entity).await?;
    create_table(db, post_tag::Entity).await?;
    create_table(db, post_reaction::Entity).await?;
    create_table(db, post_subscription::Entity).await?;
    create_table(db, comment::Entity).await?;
    create_table(db, comment_tag::Entity).await?;
    create_table(db, comment_reaction::Entity).await?;
    create_table(db, publication::Entity).await?;
    create_table(db, chapter::Entity).await?;
    create_table(db, chat::Entity).await?;
    create_table(db, participant::Entity).await?;
    create_table(db, message::Entity).await?;
    create_table(db, notification::Entity).await?;
    create_table(db, notification_actor::Entity).await?;
    create_table(db, timeline_item::Entity).await?;
    create_table(db, email_verification_code::Entity).await?;
    info!(backend = ?db.get_database_backend(), "Database schema ready");
    Ok(())
}

/// At most one unread notification per recipient, kind and post, except
/// post mentions which are never folded. The expression keeps follows (no
/// post) unique too.
const UNREAD_NOTIFICATION_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_notifications_unread \
     ON notifications (user_id, kind, COALESCE(post_id, '')) \
     WHERE read_at IS NULL AND kind <> 'post_mention'";

/// Ensure composite indexes exist.
///
/// Entity attributes only describe single-column indexes, so the composite
/// ones backing keyset pagination and pair uniqueness are created here.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let statements: Vec<(&str, IndexCreateStatement)> = vec![
        // One chat per ordered user pair.
        (
            "uq_participants_pair",
            Index::create()
                .table(participant::Entity)
                .col(participant::Column::UserId)
                .col(participant::Column::OtherUserId)
                .unique()
                .to_owned(),
        ),
        // One feed row per viewer and post.
        (
            "uq_timeline_user_post",
            Index::create()
                .table(timeline_item::Entity)
                .col(timeline_item::Column::UserId)
                .col(timeline_item::Column::PostId)
                .unique()
                .to_owned(),
        ),
        (
            "uq_chapters_publication_number",
            Index::create()
                .table(chapter::Entity)
                .col(chapter::Column::PublicationId)
                .col(chapter::Column::Number)
                .unique()
                .to_owned(),
        ),
        // SELECT ... FROM timeline WHERE user_id = ? ORDER BY created_at DESC, id DESC
        (
            "idx_timeline_user_created",
            Index::create()
                .table(timeline_item::Entity)
                .col(timeline_item::Column::UserId)
                .col(timeline_item::Column::CreatedAt)
                .col(timeline_item::Column::Id)
                .to_owned(),
        ),
        (
            "idx_posts_created",
            Index::create()
                .table(post::Entity)
                .col(post::Column::CreatedAt)
                .col(post::Column::Id)
                .to_owned(),
        ),
        (
            "idx_comments_post_created",
            Index::create()
                .table(comment::Entity)
                .col(comment::Column::PostId)
                .col(comment::Column::CreatedAt)
                .to_owned(),
        ),
        (
            "idx_messages_chat_created",
            Index::create()
                .table(message::Entity)
                .col(message::Column::ChatId)
                .col(message::Column::CreatedAt)
                .to_owned(),
        ),
        // Unread lookup for coalescing.
        (
            "idx_notifications_recipient_kind",
            Index::create()
                .table(notification::Entity)
                .col(notification::Column::UserId)
                .col(notification::Column::Kind)
                .col(notification::Column::PostId)
                .to_owned(),
        ),
        (
            "idx_codes_email",
            Index::create()
                .table(email_verification_code::Entity)
                .col(email_verification_code::Column::Email)
                .to_owned(),
        ),
    ];

    let backend = db.get_database_backend();
    for (name, mut stmt) in statements {
        stmt.name(name).if_not_exists();
        match db.execute(backend.build(&stmt)).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) if stmt.is_unique_key() => return Err(e),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    db.execute_unprepared(UNREAD_NOTIFICATION_INDEX).await?;
    info!("Ensured index uq_notifications_unread exists");

    Ok(())
}
