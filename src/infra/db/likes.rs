use async_trait::async_trait;

use crate::{
    application::repos::{LikesRepo, RepoError},
    domain::entities::{LikeToggle, MessageWithAuthor, UserRecord},
};

use super::{
    MESSAGE_WITH_AUTHOR_COLUMNS, PostgresRepositories, USER_COLUMNS, map_sqlx_error,
    messages::MessageWithAuthorRow, users::UserRow,
};

#[async_trait]
impl LikesRepo for PostgresRepositories {
    async fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<LikeToggle, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Serializes concurrent toggles by the same user.
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if locked.is_none() {
            return Err(RepoError::NotFound);
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM likes WHERE user_id = $1 AND message_id = $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let outcome = match existing {
            Some(_) => {
                sqlx::query("DELETE FROM likes WHERE user_id = $1 AND message_id = $2")
                    .bind(user_id)
                    .bind(message_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                LikeToggle::Removed
            }
            None => {
                sqlx::query("INSERT INTO likes (user_id, message_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(message_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                LikeToggle::Added
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn liked_message_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT message_id FROM likes WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_liked_messages(
        &self,
        user_id: i64,
    ) -> Result<Vec<MessageWithAuthor>, RepoError> {
        let sql = format!(
            "SELECT {MESSAGE_WITH_AUTHOR_COLUMNS} FROM messages m \
             INNER JOIN users u ON u.id = m.user_id \
             INNER JOIN likes l ON l.message_id = m.id \
             WHERE l.user_id = $1 \
             ORDER BY m.\"timestamp\" DESC, m.id DESC"
        );
        let rows = sqlx::query_as::<_, MessageWithAuthorRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageWithAuthor::from).collect())
    }

    async fn list_likers(&self, message_id: i64) -> Result<Vec<UserRecord>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             INNER JOIN likes l ON l.user_id = u.id \
             WHERE l.message_id = $1 \
             ORDER BY u.username"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(message_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }
}
