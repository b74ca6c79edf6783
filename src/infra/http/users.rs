use axum::{
    extract::{Extension, Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::accounts::AccountError;
use crate::application::social::SocialError;
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::users::ProfileInput;
use crate::domain::validation::FieldErrors;
use crate::presentation::views::{
    AccountFormTemplate, DirectoryView, FormFieldView, FormView, LayoutContext, MessageView,
    ProfileHeaderView, ProfileMessagesView, ProfileUsersView, UserCardView, UserFollowersTemplate,
    UserFollowingTemplate, UserLikesTemplate, UserShowTemplate, UsersIndexTemplate,
};

use super::middleware::{CurrentUser, Viewer};
use super::{FlashCategory, HttpState, PathId, Session, forbidden, not_found_page, render_page};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct DirectoryQuery {
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ProfileForm {
    username: String,
    email: String,
    image_url: String,
    header_image_url: String,
    bio: String,
    location: String,
    password: String,
}

impl ProfileForm {
    fn from_user(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            image_url: user.image_url.clone(),
            header_image_url: user.header_image_url.clone(),
            bio: user.bio.clone().unwrap_or_default(),
            location: user.location.clone().unwrap_or_default(),
            password: String::new(),
        }
    }
}

fn profile_form(user_id: i64, values: &ProfileForm, errors: &FieldErrors) -> FormView {
    FormView {
        heading: "Edit Your Profile.",
        action: format!("/users/{user_id}/profile"),
        submit_label: "Edit this user!",
        fields: vec![
            FormFieldView::new("username", "Username", "text")
                .with_value(&values.username)
                .with_errors(errors),
            FormFieldView::new("email", "E-mail", "email")
                .with_value(&values.email)
                .with_errors(errors),
            FormFieldView::new("image_url", "(Optional) Image URL", "text")
                .with_value(&values.image_url)
                .with_errors(errors),
            FormFieldView::new("header_image_url", "(Optional) Header Image URL", "text")
                .with_value(&values.header_image_url)
                .with_errors(errors),
            FormFieldView::new("bio", "(Optional) Tell us about yourself", "textarea")
                .with_value(&values.bio)
                .with_errors(errors),
            FormFieldView::new("location", "(Optional) Location", "text")
                .with_value(&values.location)
                .with_errors(errors),
            FormFieldView::new("password", "Password", "password").with_errors(errors),
        ],
    }
}

/// A missing user renders the 404 page; anything else is a plain error response.
fn social_failure(
    source: &'static str,
    err: SocialError,
    session: Session,
    viewer: Option<&UserRecord>,
) -> Response {
    match err {
        SocialError::Domain(DomainError::NotFound { .. }) => not_found_page(session, viewer),
        other => other.into_http(source).into_response(),
    }
}

pub(super) async fn index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    session: Session,
    Query(query): Query<DirectoryQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::users::index";

    match state
        .social
        .directory(query.q.as_deref(), viewer.user())
        .await
    {
        Ok(cards) => {
            let content = DirectoryView {
                query: query.q.unwrap_or_default(),
                users: UserCardView::list(&cards, viewer.user()),
            };
            render_page(session, viewer.user(), StatusCode::OK, |chrome| {
                UsersIndexTemplate {
                    view: LayoutContext::new(chrome, content),
                }
            })
        }
        Err(err) => social_failure(SOURCE, err, session, viewer.user()),
    }
}

pub(super) async fn show(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    session: Session,
    PathId(user_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::users::show";

    match state.social.profile(user_id, viewer.user()).await {
        Ok(page) => {
            let content = ProfileMessagesView {
                header: ProfileHeaderView::build(&page.summary, viewer.user()),
                messages: MessageView::list(&page.messages, viewer.user(), &page.liked_by_viewer),
            };
            render_page(session, viewer.user(), StatusCode::OK, |chrome| {
                UserShowTemplate {
                    view: LayoutContext::new(chrome, content),
                }
            })
        }
        Err(err) => social_failure(SOURCE, err, session, viewer.user()),
    }
}

pub(super) async fn following(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(user_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::users::following";

    match state.social.following(user_id, &user).await {
        Ok(page) => {
            let content = ProfileUsersView {
                header: ProfileHeaderView::build(&page.summary, Some(&user)),
                users: UserCardView::list(&page.users, Some(&user)),
            };
            render_page(session, Some(&user), StatusCode::OK, |chrome| {
                UserFollowingTemplate {
                    view: LayoutContext::new(chrome, content),
                }
            })
        }
        Err(err) => social_failure(SOURCE, err, session, Some(&user)),
    }
}

pub(super) async fn followers(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(user_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::users::followers";

    match state.social.followers(user_id, &user).await {
        Ok(page) => {
            let content = ProfileUsersView {
                header: ProfileHeaderView::build(&page.summary, Some(&user)),
                users: UserCardView::list(&page.users, Some(&user)),
            };
            render_page(session, Some(&user), StatusCode::OK, |chrome| {
                UserFollowersTemplate {
                    view: LayoutContext::new(chrome, content),
                }
            })
        }
        Err(err) => social_failure(SOURCE, err, session, Some(&user)),
    }
}

pub(super) async fn likes(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(user_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::users::likes";

    match state.social.likes(user_id, &user).await {
        Ok(page) => {
            let content = ProfileMessagesView {
                header: ProfileHeaderView::build(&page.summary, Some(&user)),
                messages: MessageView::list(&page.messages, Some(&user), &page.liked_by_viewer),
            };
            render_page(session, Some(&user), StatusCode::OK, |chrome| {
                UserLikesTemplate {
                    view: LayoutContext::new(chrome, content),
                }
            })
        }
        Err(err) => social_failure(SOURCE, err, session, Some(&user)),
    }
}

pub(super) async fn follow(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(followed_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::users::follow";

    match state.social.follow(&user, followed_id).await {
        Ok(()) => Redirect::to(&format!("/users/{}/following", user.id)).into_response(),
        Err(err) => social_failure(SOURCE, err, session, Some(&user)),
    }
}

pub(super) async fn stop_following(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(followed_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::users::stop_following";

    match state.social.stop_following(&user, followed_id).await {
        Ok(()) => Redirect::to(&format!("/users/{}/following", user.id)).into_response(),
        Err(err) => social_failure(SOURCE, err, session, Some(&user)),
    }
}

fn render_profile_form(
    session: Session,
    user: &UserRecord,
    values: &ProfileForm,
    errors: &FieldErrors,
) -> Response {
    let form = profile_form(user.id, values, errors);
    render_page(session, Some(user), StatusCode::OK, |chrome| {
        AccountFormTemplate {
            view: LayoutContext::new(chrome, form),
        }
    })
}

pub(super) async fn edit_profile_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(user_id): PathId,
) -> Response {
    if user_id != user.id {
        return forbidden(
            "infra::http::users::edit_profile_page",
            format!("user {} may not edit user {user_id}", user.id),
        );
    }

    render_profile_form(
        session,
        &user,
        &ProfileForm::from_user(&user),
        &FieldErrors::new(),
    )
}

pub(super) async fn edit_profile_submit(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(user_id): PathId,
    Form(form): Form<ProfileForm>,
) -> Response {
    const SOURCE: &str = "infra::http::users::edit_profile_submit";

    if user_id != user.id {
        return forbidden(
            SOURCE,
            format!("user {} may not edit user {user_id}", user.id),
        );
    }

    let input = ProfileInput {
        username: form.username.clone(),
        email: form.email.clone(),
        image_url: Some(form.image_url.clone()),
        header_image_url: Some(form.header_image_url.clone()),
        bio: Some(form.bio.clone()),
        location: Some(form.location.clone()),
        password: form.password.clone(),
    };

    match state.accounts.update_profile(user.id, input).await {
        Ok(updated) => Redirect::to(&format!("/users/{}", updated.id)).into_response(),
        Err(AccountError::WrongPassword) => {
            let session = session.flash(FlashCategory::Danger, "The password is incorrect!");
            (session, Redirect::to("/")).into_response()
        }
        Err(AccountError::Domain(DomainError::Validation(errors))) => {
            render_profile_form(session, &user, &form, &errors)
        }
        Err(AccountError::UsernameTaken) => render_profile_form(
            session.flash(FlashCategory::Danger, "Username already taken"),
            &user,
            &form,
            &FieldErrors::new(),
        ),
        Err(AccountError::EmailTaken) => render_profile_form(
            session.flash(FlashCategory::Danger, "Email already taken"),
            &user,
            &form,
            &FieldErrors::new(),
        ),
        Err(err) => err.into_http(SOURCE).into_response(),
    }
}

pub(super) async fn delete_account(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Response {
    const SOURCE: &str = "infra::http::users::delete_account";

    match state.accounts.delete_account(user.id).await {
        Ok(()) => (session.logout(), Redirect::to("/signup")).into_response(),
        Err(err) => err.into_http(SOURCE).into_response(),
    }
}
