pub mod chapter;
pub mod chat;
pub mod comment;
pub mod comment_reaction;
pub mod comment_tag;
pub mod email_verification_code;
pub mod follow;
pub mod message;
pub mod notification;
pub mod notification_actor;
pub mod participant;
pub mod post;
pub mod post_reaction;
pub mod post_subscription;
pub mod post_tag;
pub mod publication;
pub mod timeline_item;
pub mod user;
