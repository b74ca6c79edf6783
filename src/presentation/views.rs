use std::collections::HashSet;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::social::{ProfileSummary, UserCard};
use crate::domain::entities::{MessageWithAuthor, UserRecord};
use crate::domain::validation::FieldErrors;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const MESSAGE_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:long] [year]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::not_found());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The signed-in user as the navigation bar shows them.
#[derive(Clone)]
pub struct ViewerView {
    pub id: i64,
    pub username: String,
    pub image_url: String,
}

impl From<&UserRecord> for ViewerView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            image_url: user.image_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct FlashView {
    pub category: &'static str,
    pub message: String,
}

#[derive(Clone, Default)]
pub struct LayoutChrome {
    pub viewer: Option<ViewerView>,
    pub flashes: Vec<FlashView>,
}

impl LayoutChrome {
    pub fn new(viewer: Option<&UserRecord>, flashes: Vec<FlashView>) -> Self {
        Self {
            viewer: viewer.map(ViewerView::from),
            flashes,
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<ViewerView>,
    pub flashes: Vec<FlashView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            viewer: chrome.viewer,
            flashes: chrome.flashes,
            content,
        }
    }
}

#[derive(Clone)]
pub struct FormFieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub errors: Vec<String>,
}

impl FormFieldView {
    pub fn new(name: &'static str, label: &'static str, input_type: &'static str) -> Self {
        Self {
            name,
            label,
            input_type,
            value: String::new(),
            errors: Vec::new(),
        }
    }

    /// Password inputs are never echoed back.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        if self.input_type != "password" {
            self.value = value.into();
        }
        self
    }

    pub fn with_errors(mut self, errors: &FieldErrors) -> Self {
        self.errors = errors.messages_for(self.name);
        self
    }
}

#[derive(Clone)]
pub struct FormView {
    pub heading: &'static str,
    pub action: String,
    pub submit_label: &'static str,
    pub fields: Vec<FormFieldView>,
}

#[derive(Clone)]
pub struct MessageView {
    pub id: i64,
    pub text: String,
    pub date: String,
    pub user_id: i64,
    pub username: String,
    pub image_url: String,
    pub liked: bool,
    pub can_like: bool,
    pub can_delete: bool,
}

impl MessageView {
    pub fn build(
        message: &MessageWithAuthor,
        viewer: Option<&UserRecord>,
        liked: &HashSet<i64>,
    ) -> Self {
        let viewer_id = viewer.map(|user| user.id);
        Self {
            id: message.id,
            text: message.text.clone(),
            date: format_message_date(message.timestamp),
            user_id: message.user_id,
            username: message.username.clone(),
            image_url: message.image_url.clone(),
            liked: liked.contains(&message.id),
            can_like: viewer_id.is_some_and(|id| id != message.user_id),
            can_delete: viewer_id == Some(message.user_id),
        }
    }

    pub fn list(
        messages: &[MessageWithAuthor],
        viewer: Option<&UserRecord>,
        liked: &HashSet<i64>,
    ) -> Vec<Self> {
        messages
            .iter()
            .map(|message| Self::build(message, viewer, liked))
            .collect()
    }
}

pub fn format_message_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(MESSAGE_DATE_FORMAT)
        .unwrap_or_else(|_| timestamp.date().to_string())
}

#[derive(Clone)]
pub struct UserCardView {
    pub id: i64,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub followed: bool,
    pub show_follow: bool,
}

impl UserCardView {
    pub fn build(card: &UserCard, viewer: Option<&UserRecord>) -> Self {
        let user = &card.user;
        Self {
            id: user.id,
            username: user.username.clone(),
            image_url: user.image_url.clone(),
            header_image_url: user.header_image_url.clone(),
            bio: user.bio.clone(),
            followed: card.followed_by_viewer,
            show_follow: viewer.is_some_and(|viewer| viewer.id != user.id),
        }
    }

    pub fn list(cards: &[UserCard], viewer: Option<&UserRecord>) -> Vec<Self> {
        cards
            .iter()
            .map(|card| Self::build(card, viewer))
            .collect()
    }
}

/// Header, avatar and counters shared by every profile page.
#[derive(Clone)]
pub struct ProfileHeaderView {
    pub id: i64,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub messages: u64,
    pub following: u64,
    pub followers: u64,
    pub likes: u64,
    pub is_viewer: bool,
    pub show_follow: bool,
    pub followed: bool,
}

impl ProfileHeaderView {
    pub fn build(summary: &ProfileSummary, viewer: Option<&UserRecord>) -> Self {
        let user = &summary.user;
        let is_viewer = viewer.is_some_and(|viewer| viewer.id == user.id);
        Self {
            id: user.id,
            username: user.username.clone(),
            image_url: user.image_url.clone(),
            header_image_url: user.header_image_url.clone(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            messages: summary.stats.messages,
            following: summary.stats.following,
            followers: summary.stats.followers,
            likes: summary.stats.likes,
            is_viewer,
            show_follow: viewer.is_some() && !is_viewer,
            followed: summary.followed_by_viewer,
        }
    }
}

pub struct HomeView {
    pub messages: Vec<MessageView>,
}

pub struct DirectoryView {
    pub query: String,
    pub users: Vec<UserCardView>,
}

pub struct ProfileMessagesView {
    pub header: ProfileHeaderView,
    pub messages: Vec<MessageView>,
}

pub struct ProfileUsersView {
    pub header: ProfileHeaderView,
    pub users: Vec<UserCardView>,
}

pub struct MessageDetailView {
    pub message: MessageView,
    pub likers: Vec<ViewerView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub view: LayoutContext<HomeView>,
}

#[derive(Template)]
#[template(path = "home-anon.html")]
pub struct AnonHomeTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[derive(Template)]
#[template(path = "users/form.html")]
pub struct AccountFormTemplate {
    pub view: LayoutContext<FormView>,
}

#[derive(Template)]
#[template(path = "users/index.html")]
pub struct UsersIndexTemplate {
    pub view: LayoutContext<DirectoryView>,
}

#[derive(Template)]
#[template(path = "users/show.html")]
pub struct UserShowTemplate {
    pub view: LayoutContext<ProfileMessagesView>,
}

#[derive(Template)]
#[template(path = "users/likes.html")]
pub struct UserLikesTemplate {
    pub view: LayoutContext<ProfileMessagesView>,
}

#[derive(Template)]
#[template(path = "users/following.html")]
pub struct UserFollowingTemplate {
    pub view: LayoutContext<ProfileUsersView>,
}

#[derive(Template)]
#[template(path = "users/followers.html")]
pub struct UserFollowersTemplate {
    pub view: LayoutContext<ProfileUsersView>,
}

#[derive(Template)]
#[template(path = "messages/new.html")]
pub struct NewMessageTemplate {
    pub view: LayoutContext<FormView>,
}

#[derive(Template)]
#[template(path = "messages/show.html")]
pub struct MessageShowTemplate {
    pub view: LayoutContext<MessageDetailView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn user(id: i64) -> UserRecord {
        UserRecord {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            image_url: "/static/images/default-pic.svg".to_string(),
            header_image_url: "/static/images/warbler-hero.svg".to_string(),
            bio: None,
            location: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    fn message(id: i64, user_id: i64) -> MessageWithAuthor {
        MessageWithAuthor {
            id,
            text: "hello".to_string(),
            timestamp: datetime!(2024-03-05 12:30 UTC),
            user_id,
            username: format!("user{user_id}"),
            image_url: "/static/images/default-pic.svg".to_string(),
        }
    }

    #[test]
    fn message_date_uses_long_month() {
        assert_eq!(
            format_message_date(datetime!(2024-03-05 12:30 UTC)),
            "05 March 2024"
        );
    }

    #[test]
    fn message_permissions_follow_ownership() {
        let liked = HashSet::from([7]);
        let own = MessageView::build(&message(7, 1), Some(&user(1)), &liked);
        assert!(own.can_delete);
        assert!(!own.can_like);
        assert!(own.liked);

        let other = MessageView::build(&message(8, 2), Some(&user(1)), &liked);
        assert!(!other.can_delete);
        assert!(other.can_like);
        assert!(!other.liked);

        let anonymous = MessageView::build(&message(8, 2), None, &HashSet::new());
        assert!(!anonymous.can_delete);
        assert!(!anonymous.can_like);
    }

    #[test]
    fn password_fields_are_never_echoed() {
        let field = FormFieldView::new("password", "Password", "password").with_value("secret");
        assert!(field.value.is_empty());

        let field = FormFieldView::new("username", "Username", "text").with_value("alice");
        assert_eq!(field.value, "alice");
    }

    #[test]
    fn not_found_page_renders_with_status() {
        let response = render_not_found_response(LayoutChrome::default());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
