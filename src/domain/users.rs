//! Account input rules: signup, login and profile edits.

use url::Url;

use super::validation::{FieldErrors, blank_to_none, trimmed};

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.svg";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.svg";
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

const REQUIRED: &str = "This field is required.";

/// Raw signup submission.
#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
}

/// Signup data after normalisation; `image_url` has its default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
}

impl SignupInput {
    pub fn validate(self) -> Result<ValidSignup, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = trimmed(&self.username);
        check_username(&username, &mut errors);
        let email = trimmed(&self.email);
        check_email(&email, &mut errors);
        check_password(&self.password, &mut errors);
        let image_url = blank_to_none(self.image_url);
        if let Some(url) = image_url.as_deref() {
            check_image_url("image_url", url, &mut errors);
        }

        errors.into_result(ValidSignup {
            username,
            email,
            password: self.password,
            image_url: image_url.unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(self) -> Result<LoginInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = trimmed(&self.username);
        if username.is_empty() {
            errors.push("username", REQUIRED);
        }
        check_password(&self.password, &mut errors);
        errors.into_result(LoginInput {
            username,
            password: self.password,
        })
    }
}

/// Raw profile edit submission. `password` confirms the change.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProfile {
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub password: String,
}

impl ProfileInput {
    pub fn validate(self) -> Result<ValidProfile, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = trimmed(&self.username);
        check_username(&username, &mut errors);
        let email = trimmed(&self.email);
        check_email(&email, &mut errors);
        if self.password.is_empty() {
            errors.push("password", REQUIRED);
        }

        let image_url = blank_to_none(self.image_url);
        if let Some(url) = image_url.as_deref() {
            check_image_url("image_url", url, &mut errors);
        }
        let header_image_url = blank_to_none(self.header_image_url);
        if let Some(url) = header_image_url.as_deref() {
            check_image_url("header_image_url", url, &mut errors);
        }

        errors.into_result(ValidProfile {
            username,
            email,
            image_url: image_url.unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            header_image_url: header_image_url
                .unwrap_or_else(|| DEFAULT_HEADER_IMAGE_URL.to_string()),
            bio: blank_to_none(self.bio),
            location: blank_to_none(self.location),
            password: self.password,
        })
    }
}

fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.push("username", REQUIRED);
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.push(
            "username",
            format!("Username must be at most {MAX_USERNAME_LEN} characters."),
        );
    }
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.push("email", REQUIRED);
    } else if !looks_like_email(email) {
        errors.push("email", "Invalid email address.");
    }
}

fn check_password(password: &str, errors: &mut FieldErrors) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            "password",
            format!("Field must be at least {MIN_PASSWORD_LEN} characters long."),
        );
    }
}

fn check_image_url(field: &'static str, value: &str, errors: &mut FieldErrors) {
    if !is_acceptable_image_url(value) {
        errors.push(field, "Enter an http(s) URL or a path starting with `/`.");
    }
}

/// Single `@`, non-empty local part, dotted domain, no whitespace.
pub fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

pub fn is_acceptable_image_url(value: &str) -> bool {
    if value.starts_with('/') {
        return !value.starts_with("//") && !value.chars().any(char::is_whitespace);
    }
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
