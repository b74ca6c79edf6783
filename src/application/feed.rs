use std::collections::HashSet;
use std::sync::Arc;

use crate::application::repos::{LikesRepo, MessagesRepo, RepoError};
use crate::domain::entities::{MessageWithAuthor, UserRecord};

/// The signed-in homepage: the viewer's own messages plus everyone they follow.
#[derive(Debug, Clone)]
pub struct HomeTimeline {
    pub messages: Vec<MessageWithAuthor>,
    pub liked: HashSet<i64>,
}

#[derive(Clone)]
pub struct FeedService {
    messages: Arc<dyn MessagesRepo>,
    likes: Arc<dyn LikesRepo>,
    limit: u32,
}

impl FeedService {
    pub fn new(messages: Arc<dyn MessagesRepo>, likes: Arc<dyn LikesRepo>, limit: u32) -> Self {
        Self {
            messages,
            likes,
            limit,
        }
    }

    pub async fn home(&self, viewer: &UserRecord) -> Result<HomeTimeline, RepoError> {
        let messages = self.messages.timeline(viewer.id, self.limit).await?;
        let liked = self
            .likes
            .liked_message_ids(viewer.id)
            .await?
            .into_iter()
            .collect();
        Ok(HomeTimeline { messages, liked })
    }
}
