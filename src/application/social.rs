//! Directory, profiles and the follow graph.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{FollowsRepo, LikesRepo, MessagesRepo, RepoError, UsersRepo};
use crate::domain::entities::{MessageWithAuthor, UserRecord, UserStats};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A listed user together with the viewer's relationship to them.
#[derive(Debug, Clone)]
pub struct UserCard {
    pub user: UserRecord,
    pub followed_by_viewer: bool,
}

/// Everything a profile header needs.
#[derive(Debug, Clone)]
pub struct ProfileSummary {
    pub user: UserRecord,
    pub stats: UserStats,
    pub followed_by_viewer: bool,
}

#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub summary: ProfileSummary,
    pub messages: Vec<MessageWithAuthor>,
    pub liked_by_viewer: HashSet<i64>,
}

#[derive(Debug, Clone)]
pub struct ProfileUsers {
    pub summary: ProfileSummary,
    pub users: Vec<UserCard>,
}

#[derive(Clone)]
pub struct SocialService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    messages: Arc<dyn MessagesRepo>,
    likes: Arc<dyn LikesRepo>,
    message_limit: u32,
}

impl SocialService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        messages: Arc<dyn MessagesRepo>,
        likes: Arc<dyn LikesRepo>,
        message_limit: u32,
    ) -> Self {
        Self {
            users,
            follows,
            messages,
            likes,
            message_limit,
        }
    }

    pub async fn directory(
        &self,
        search: Option<&str>,
        viewer: Option<&UserRecord>,
    ) -> Result<Vec<UserCard>, SocialError> {
        let search = search.map(str::trim).filter(|value| !value.is_empty());
        let users = self.users.list_users(search).await?;
        self.cards(users, viewer).await
    }

    pub async fn profile(
        &self,
        user_id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<ProfilePage, SocialError> {
        let summary = self.summary(user_id, viewer).await?;
        let messages = self
            .messages
            .list_for_user(user_id, self.message_limit)
            .await?;
        let liked_by_viewer = self.liked_ids(viewer).await?;

        Ok(ProfilePage {
            summary,
            messages,
            liked_by_viewer,
        })
    }

    pub async fn following(
        &self,
        user_id: i64,
        viewer: &UserRecord,
    ) -> Result<ProfileUsers, SocialError> {
        let summary = self.summary(user_id, Some(viewer)).await?;
        let users = self.follows.list_following(user_id).await?;
        let users = self.cards(users, Some(viewer)).await?;
        Ok(ProfileUsers { summary, users })
    }

    pub async fn followers(
        &self,
        user_id: i64,
        viewer: &UserRecord,
    ) -> Result<ProfileUsers, SocialError> {
        let summary = self.summary(user_id, Some(viewer)).await?;
        let users = self.follows.list_followers(user_id).await?;
        let users = self.cards(users, Some(viewer)).await?;
        Ok(ProfileUsers { summary, users })
    }

    pub async fn likes(
        &self,
        user_id: i64,
        viewer: &UserRecord,
    ) -> Result<ProfilePage, SocialError> {
        let summary = self.summary(user_id, Some(viewer)).await?;
        let messages = self.likes.list_liked_messages(user_id).await?;
        let liked_by_viewer = self.liked_ids(Some(viewer)).await?;
        Ok(ProfilePage {
            summary,
            messages,
            liked_by_viewer,
        })
    }

    pub async fn follow(&self, follower: &UserRecord, followed_id: i64) -> Result<(), SocialError> {
        self.require_user(followed_id).await?;
        self.follows.follow(follower.id, followed_id).await?;
        info!(
            target = "warbler::social",
            follower_id = follower.id,
            followed_id,
            "follow added"
        );
        Ok(())
    }

    pub async fn stop_following(
        &self,
        follower: &UserRecord,
        followed_id: i64,
    ) -> Result<(), SocialError> {
        self.require_user(followed_id).await?;
        let removed = self.follows.unfollow(follower.id, followed_id).await?;
        info!(
            target = "warbler::social",
            follower_id = follower.id,
            followed_id,
            removed,
            "follow removed"
        );
        Ok(())
    }

    /// Whether `user` follows `other`.
    pub async fn is_following(
        &self,
        user: &UserRecord,
        other: &UserRecord,
    ) -> Result<bool, SocialError> {
        Ok(self.follows.is_following(user.id, other.id).await?)
    }

    /// Whether `other` follows `user`.
    pub async fn is_followed_by(
        &self,
        user: &UserRecord,
        other: &UserRecord,
    ) -> Result<bool, SocialError> {
        Ok(self.follows.is_following(other.id, user.id).await?)
    }

    async fn require_user(&self, user_id: i64) -> Result<UserRecord, SocialError> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| SocialError::Domain(DomainError::not_found("user")))
    }

    async fn summary(
        &self,
        user_id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<ProfileSummary, SocialError> {
        let user = self.require_user(user_id).await?;
        let stats = self.users.user_stats(user_id).await?;
        let followed_by_viewer = match viewer {
            Some(viewer) if viewer.id != user.id => {
                self.follows.is_following(viewer.id, user.id).await?
            }
            _ => false,
        };

        Ok(ProfileSummary {
            user,
            stats,
            followed_by_viewer,
        })
    }

    async fn cards(
        &self,
        users: Vec<UserRecord>,
        viewer: Option<&UserRecord>,
    ) -> Result<Vec<UserCard>, SocialError> {
        let followed: HashSet<i64> = match viewer {
            Some(viewer) => self
                .follows
                .following_ids(viewer.id)
                .await?
                .into_iter()
                .collect(),
            None => HashSet::new(),
        };

        Ok(users
            .into_iter()
            .map(|user| UserCard {
                followed_by_viewer: followed.contains(&user.id),
                user,
            })
            .collect())
    }

    async fn liked_ids(&self, viewer: Option<&UserRecord>) -> Result<HashSet<i64>, SocialError> {
        match viewer {
            Some(viewer) => Ok(self
                .likes
                .liked_message_ids(viewer.id)
                .await?
                .into_iter()
                .collect()),
            None => Ok(HashSet::new()),
        }
    }
}
