use common::text::smart_trim;
use tracing::instrument;

use super::{Service, validate};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::hub;
use crate::models::chat::{Chat, CreateChatOutput, MESSAGE_CONTENT_MAX_LEN, Message};
use crate::models::shared::{Page, PageArgs};

fn checked_content(raw: &str) -> Result<String, AppError> {
    let content = smart_trim(raw);
    validate(|v| v.check_len(&content, 1, MESSAGE_CONTENT_MAX_LEN, "content"))?;
    Ok(content)
}

impl Service {
    /// Open a chat with `other_user_id` and send its first message.
    #[instrument(skip(self, auth, content), fields(user_id = %auth.user_id))]
    pub async fn create_chat(
        &self,
        auth: &AuthUser,
        other_user_id: &str,
        content: &str,
    ) -> Result<CreateChatOutput, AppError> {
        let content = checked_content(content)?;
        let (chat, message) = self
            .store
            .create_chat(&auth.user_id, other_user_id, content)
            .await?;
        self.effects.publish(&hub::messages_topic(&chat.id), &message);
        Ok(CreateChatOutput {
            chat: self.with_prefixes(chat),
            message,
        })
    }

    /// The caller's chat with `other_user_id`, if there is one.
    pub async fn chat_with(&self, auth: &AuthUser, other_user_id: &str) -> Result<Chat, AppError> {
        let chat = self
            .store
            .chat_from_participants(&auth.user_id, other_user_id)
            .await?;
        Ok(self.with_prefixes(chat))
    }

    pub async fn chat(&self, auth: &AuthUser, chat_id: &str) -> Result<Chat, AppError> {
        let chat = self.store.chat(&auth.user_id, chat_id).await?;
        Ok(self.with_prefixes(chat))
    }

    pub async fn chats(&self, auth: &AuthUser, args: &PageArgs) -> Result<Page<Chat>, AppError> {
        let page = self.page(args)?;
        let chats = self.store.chats(&auth.user_id, &page).await?;
        Ok(self.with_prefixes(chats))
    }

    /// Send a message; the participant state machine decides whether the
    /// caller may.
    #[instrument(skip(self, auth, content), fields(user_id = %auth.user_id))]
    pub async fn create_message(&self, auth: &AuthUser, chat_id: &str, content: &str) -> Result<Message, AppError> {
        let content = checked_content(content)?;
        let message = self
            .store
            .create_message(&auth.user_id, chat_id, content)
            .await?;
        self.effects.publish(&hub::messages_topic(chat_id), &message);
        Ok(message)
    }

    /// Messages of a chat; marks the chat read for the caller.
    pub async fn messages(&self, auth: &AuthUser, chat_id: &str, args: &PageArgs) -> Result<Page<Message>, AppError> {
        let page = self.page(args)?;
        self.store.messages(&auth.user_id, chat_id, &page).await
    }

    pub async fn has_unread_chats(&self, auth: &AuthUser) -> Result<bool, AppError> {
        self.store.has_unread_chats(&auth.user_id).await
    }
}
