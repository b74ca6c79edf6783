//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    LikeToggle, MessageRecord, MessageWithAuthor, UserRecord, UserStats,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileParams {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateMessageParams {
    pub user_id: i64,
    pub text: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    /// All users, optionally filtered by a case-insensitive username substring.
    async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRecord>, RepoError>;

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError>;

    /// Returns `false` when no row matched.
    async fn delete_user(&self, id: i64) -> Result<bool, RepoError>;

    async fn user_stats(&self, id: i64) -> Result<UserStats, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Idempotent: an existing edge is left untouched.
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), RepoError>;

    /// Returns `false` when there was no edge to remove.
    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, RepoError>;

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, RepoError>;

    async fn list_following(&self, user_id: i64) -> Result<Vec<UserRecord>, RepoError>;

    async fn list_followers(&self, user_id: i64) -> Result<Vec<UserRecord>, RepoError>;

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError>;
}

#[async_trait]
pub trait MessagesRepo: Send + Sync {
    async fn create_message(&self, params: CreateMessageParams)
    -> Result<MessageRecord, RepoError>;

    async fn find_message(&self, id: i64) -> Result<Option<MessageWithAuthor>, RepoError>;

    /// Returns `false` when no row matched.
    async fn delete_message(&self, id: i64) -> Result<bool, RepoError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<MessageWithAuthor>, RepoError>;

    /// Messages by `user_id` and everyone that user follows, newest first.
    async fn timeline(&self, user_id: i64, limit: u32)
    -> Result<Vec<MessageWithAuthor>, RepoError>;
}

#[async_trait]
pub trait LikesRepo: Send + Sync {
    /// Adds the like when absent and removes it when present, in one transaction.
    async fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<LikeToggle, RepoError>;

    async fn liked_message_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError>;

    /// Newest first.
    async fn list_liked_messages(
        &self,
        user_id: i64,
    ) -> Result<Vec<MessageWithAuthor>, RepoError>;

    async fn list_likers(&self, message_id: i64) -> Result<Vec<UserRecord>, RepoError>;
}
