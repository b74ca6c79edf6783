//! Domain entities mirrored from persistent storage.

use std::fmt;

use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User #{}: {}, {}>", self.id, self.username, self.email)
    }
}

/// Aggregate counters shown in a profile header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub messages: u64,
    pub following: u64,
    pub followers: u64,
    pub likes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub text: String,
    pub timestamp: OffsetDateTime,
    pub user_id: i64,
}

/// A message joined with the columns needed to render its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWithAuthor {
    pub id: i64,
    pub text: String,
    pub timestamp: OffsetDateTime,
    pub user_id: i64,
    pub username: String,
    pub image_url: String,
}

/// Outcome of flipping a like edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Added,
    Removed,
}
