pub mod auth;
pub mod chat;
pub mod comment;
pub mod notification;
pub mod post;
pub mod preview;
pub mod publication;
pub mod shared;
pub mod timeline;
pub mod user;
