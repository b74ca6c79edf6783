use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreateUserParams, RepoError, UpdateProfileParams, UsersRepo},
    domain::entities::{UserRecord, UserStats},
};

use super::{PostgresRepositories, USER_COLUMNS, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    id: i64,
    username: String,
    email: String,
    password: String,
    image_url: String,
    header_image_url: String,
    bio: Option<String>,
    location: Option<String>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password,
            image_url: row.image_url,
            header_image_url: row.header_image_url,
            bio: row.bio,
            location: row.location,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    messages: i64,
    following: i64,
    followers: i64,
    likes: i64,
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "INSERT INTO users AS u (username, email, password, image_url) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&params.username)
            .bind(&params.email)
            .bind(&params.password_hash)
            .bind(&params.image_url)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRecord>, RepoError> {
        let rows = match search {
            Some(search) => {
                let sql = format!(
                    "SELECT {USER_COLUMNS} FROM users u \
                     WHERE u.username ILIKE $1 \
                     ORDER BY u.username"
                );
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(format!("%{}%", escape_like(search)))
                    .fetch_all(self.pool())
                    .await
            }
            None => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.username");
                sqlx::query_as::<_, UserRow>(&sql)
                    .fetch_all(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "UPDATE users AS u SET \
                username = $2, \
                email = $3, \
                image_url = $4, \
                header_image_url = $5, \
                bio = $6, \
                location = $7 \
             WHERE u.id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(params.id)
            .bind(&params.username)
            .bind(&params.email)
            .bind(&params.image_url)
            .bind(&params.header_image_url)
            .bind(params.bio.as_deref())
            .bind(params.location.as_deref())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn user_stats(&self, id: i64) -> Result<UserStats, RepoError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM messages WHERE user_id = $1) AS messages,
                (SELECT COUNT(*) FROM follows WHERE user_following_id = $1) AS following,
                (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = $1) AS followers,
                (SELECT COUNT(*) FROM likes WHERE user_id = $1) AS likes
            "#,
        )
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserStats {
            messages: Self::convert_count(row.messages)?,
            following: Self::convert_count(row.following)?,
            followers: Self::convert_count(row.followers)?,
            likes: Self::convert_count(row.likes)?,
        })
    }
}

/// Escape `ILIKE` wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
