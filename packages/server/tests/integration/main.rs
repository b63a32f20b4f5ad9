mod harness;

mod auth;
mod chats;
mod notifications;
mod posts;
mod publications;
mod realtime;
mod users;
