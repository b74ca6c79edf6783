use async_trait::async_trait;

use crate::{
    application::repos::{FollowsRepo, RepoError},
    domain::entities::UserRecord,
};

use super::{PostgresRepositories, USER_COLUMNS, map_sqlx_error, users::UserRow};

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO follows (user_being_followed_id, user_following_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(followed_id)
        .bind(follower_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM follows
            WHERE user_being_followed_id = $1 AND user_following_id = $2
            "#,
        )
        .bind(followed_id)
        .bind(follower_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM follows
                WHERE user_being_followed_id = $1 AND user_following_id = $2
            )
            "#,
        )
        .bind(followed_id)
        .bind(follower_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_following(&self, user_id: i64) -> Result<Vec<UserRecord>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             INNER JOIN follows f ON f.user_being_followed_id = u.id \
             WHERE f.user_following_id = $1 \
             ORDER BY u.username"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn list_followers(&self, user_id: i64) -> Result<Vec<UserRecord>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             INNER JOIN follows f ON f.user_following_id = u.id \
             WHERE f.user_being_followed_id = $1 \
             ORDER BY u.username"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_being_followed_id FROM follows WHERE user_following_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
