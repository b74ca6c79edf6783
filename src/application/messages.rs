//! Posting, deleting and liking messages.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateMessageParams, LikesRepo, MessagesRepo, RepoError};
use crate::domain::entities::{LikeToggle, MessageRecord, MessageWithAuthor, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::messages::MessageInput;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("message belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessagesRepo>,
    likes: Arc<dyn LikesRepo>,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessagesRepo>, likes: Arc<dyn LikesRepo>) -> Self {
        Self { messages, likes }
    }

    pub async fn post(
        &self,
        author: &UserRecord,
        input: MessageInput,
    ) -> Result<MessageRecord, MessageError> {
        let text = input.validate().map_err(DomainError::from)?;
        let message = self
            .messages
            .create_message(CreateMessageParams {
                user_id: author.id,
                text,
            })
            .await?;

        counter!("warbler_messages_created_total").increment(1);
        info!(
            target = "warbler::messages",
            message_id = message.id,
            user_id = author.id,
            "message posted"
        );
        Ok(message)
    }

    pub async fn find(&self, id: i64) -> Result<Option<MessageWithAuthor>, MessageError> {
        Ok(self.messages.find_message(id).await?)
    }

    pub async fn require(&self, id: i64) -> Result<MessageWithAuthor, MessageError> {
        self.find(id)
            .await?
            .ok_or_else(|| MessageError::Domain(DomainError::not_found("message")))
    }

    /// Only the author may delete a message.
    pub async fn delete(&self, viewer: &UserRecord, id: i64) -> Result<(), MessageError> {
        let message = self.require(id).await?;
        if message.user_id != viewer.id {
            return Err(MessageError::Forbidden);
        }

        if !self.messages.delete_message(id).await? {
            return Err(MessageError::Domain(DomainError::not_found("message")));
        }
        info!(
            target = "warbler::messages",
            message_id = id,
            user_id = viewer.id,
            "message deleted"
        );
        Ok(())
    }

    pub async fn toggle_like(
        &self,
        viewer: &UserRecord,
        message_id: i64,
    ) -> Result<LikeToggle, MessageError> {
        self.require(message_id).await?;
        let outcome = self.likes.toggle_like(viewer.id, message_id).await?;
        counter!("warbler_likes_toggled_total").increment(1);
        info!(
            target = "warbler::messages",
            message_id,
            user_id = viewer.id,
            outcome = ?outcome,
            "like toggled"
        );
        Ok(outcome)
    }

    pub async fn likers(&self, message_id: i64) -> Result<Vec<UserRecord>, MessageError> {
        Ok(self.likes.list_likers(message_id).await?)
    }
}
