use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreateMessageParams, MessagesRepo, RepoError},
    domain::entities::{MessageRecord, MessageWithAuthor},
};

use super::{MESSAGE_WITH_AUTHOR_COLUMNS, PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    text: String,
    timestamp: OffsetDateTime,
    user_id: i64,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            timestamp: row.timestamp,
            user_id: row.user_id,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct MessageWithAuthorRow {
    id: i64,
    text: String,
    timestamp: OffsetDateTime,
    user_id: i64,
    username: String,
    image_url: String,
}

impl From<MessageWithAuthorRow> for MessageWithAuthor {
    fn from(row: MessageWithAuthorRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            timestamp: row.timestamp,
            user_id: row.user_id,
            username: row.username,
            image_url: row.image_url,
        }
    }
}

#[async_trait]
impl MessagesRepo for PostgresRepositories {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<MessageRecord, RepoError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (text, user_id)
            VALUES ($1, $2)
            RETURNING id, text, "timestamp", user_id
            "#,
        )
        .bind(&params.text)
        .bind(params.user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_message(&self, id: i64) -> Result<Option<MessageWithAuthor>, RepoError> {
        let sql = format!(
            "SELECT {MESSAGE_WITH_AUTHOR_COLUMNS} FROM messages m \
             INNER JOIN users u ON u.id = m.user_id \
             WHERE m.id = $1"
        );
        let row = sqlx::query_as::<_, MessageWithAuthorRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(MessageWithAuthor::from))
    }

    async fn delete_message(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<MessageWithAuthor>, RepoError> {
        let sql = format!(
            "SELECT {MESSAGE_WITH_AUTHOR_COLUMNS} FROM messages m \
             INNER JOIN users u ON u.id = m.user_id \
             WHERE m.user_id = $1 \
             ORDER BY m.\"timestamp\" DESC, m.id DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, MessageWithAuthorRow>(&sql)
            .bind(user_id)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageWithAuthor::from).collect())
    }

    async fn timeline(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<MessageWithAuthor>, RepoError> {
        let sql = format!(
            "SELECT {MESSAGE_WITH_AUTHOR_COLUMNS} FROM messages m \
             INNER JOIN users u ON u.id = m.user_id \
             WHERE m.user_id = $1 \
                OR m.user_id IN ( \
                    SELECT f.user_being_followed_id FROM follows f \
                    WHERE f.user_following_id = $1 \
                ) \
             ORDER BY m.\"timestamp\" DESC, m.id DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, MessageWithAuthorRow>(&sql)
            .bind(user_id)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageWithAuthor::from).collect())
    }
}
