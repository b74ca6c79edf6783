//! Account lifecycle: signup, authentication, profile edits and deletion.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::passwords::{PasswordHashError, hash_password, verify_password};
use crate::application::repos::{CreateUserParams, RepoError, UpdateProfileParams, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::users::{LoginInput, ProfileInput, SignupInput};

const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already taken")]
    EmailTaken,
    #[error("password does not match")]
    WrongPassword,
    #[error(transparent)]
    Hash(#[from] PasswordHashError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AccountError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } if constraint == EMAIL_CONSTRAINT => {
                AccountError::EmailTaken
            }
            RepoError::Duplicate { constraint } if constraint == USERNAME_CONSTRAINT => {
                AccountError::UsernameTaken
            }
            RepoError::NotFound => AccountError::Domain(DomainError::not_found("user")),
            other => AccountError::Repo(other),
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    /// Create a user with a hashed password. Uniqueness is left to the database.
    pub async fn signup(&self, input: SignupInput) -> Result<UserRecord, AccountError> {
        let valid = input.validate().map_err(DomainError::from)?;
        let password_hash = hash_password(&valid.password).await?;

        let user = self
            .users
            .create_user(CreateUserParams {
                username: valid.username,
                email: valid.email,
                password_hash,
                image_url: valid.image_url,
            })
            .await?;

        counter!("warbler_signups_total").increment(1);
        info!(
            target = "warbler::accounts",
            user_id = user.id,
            username = %user.username,
            "user signed up"
        );
        Ok(user)
    }

    /// `Ok(None)` when the username is unknown or the password is wrong.
    pub async fn authenticate(&self, input: LoginInput) -> Result<Option<UserRecord>, AccountError> {
        let LoginInput { username, password } = input.validate().map_err(DomainError::from)?;

        let verified = match self.users.find_by_username(&username).await? {
            Some(user) => verify_password(&password, &user.password_hash)
                .await?
                .then_some(user),
            None => None,
        };
        match verified {
            Some(user) => {
                counter!("warbler_logins_total").increment(1);
                info!(
                    target = "warbler::accounts",
                    user_id = user.id,
                    "user logged in"
                );
                Ok(Some(user))
            }
            None => {
                counter!("warbler_login_failures_total").increment(1);
                warn!(
                    target = "warbler::accounts",
                    username = %username,
                    "rejected login attempt"
                );
                Ok(None)
            }
        }
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, AccountError> {
        self.users.find_user(id).await.map_err(AccountError::from)
    }

    pub async fn require_user(&self, id: i64) -> Result<UserRecord, AccountError> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AccountError::Domain(DomainError::not_found("user")))
    }

    /// Apply a profile edit after confirming the user's current password.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: ProfileInput,
    ) -> Result<UserRecord, AccountError> {
        let valid = input.validate().map_err(DomainError::from)?;
        let current = self.require_user(user_id).await?;

        if !verify_password(&valid.password, &current.password_hash).await? {
            return Err(AccountError::WrongPassword);
        }

        let updated = self
            .users
            .update_profile(UpdateProfileParams {
                id: current.id,
                username: valid.username,
                email: valid.email,
                image_url: valid.image_url,
                header_image_url: valid.header_image_url,
                bio: valid.bio,
                location: valid.location,
            })
            .await?;

        info!(
            target = "warbler::accounts",
            user_id = updated.id,
            "profile updated"
        );
        Ok(updated)
    }

    /// Remove the user; messages, follows and likes go with it.
    pub async fn delete_account(&self, user_id: i64) -> Result<(), AccountError> {
        if !self.users.delete_user(user_id).await? {
            return Err(AccountError::Domain(DomainError::not_found("user")));
        }
        info!(target = "warbler::accounts", user_id, "user deleted");
        Ok(())
    }
}
