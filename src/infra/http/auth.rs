use axum::{
    extract::{Extension, Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::application::accounts::AccountError;
use crate::domain::error::DomainError;
use crate::domain::users::{LoginInput, SignupInput};
use crate::domain::validation::FieldErrors;
use crate::presentation::views::{AccountFormTemplate, FormFieldView, FormView, LayoutContext};

use super::middleware::Viewer;
use super::{FlashCategory, HttpState, Session, render_page};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    username: String,
    email: String,
    password: String,
    image_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
}

fn signup_form(values: &SignupForm, errors: &FieldErrors) -> FormView {
    FormView {
        heading: "Join Warbler today.",
        action: "/signup".to_string(),
        submit_label: "Sign me up!",
        fields: vec![
            FormFieldView::new("username", "Username", "text")
                .with_value(&values.username)
                .with_errors(errors),
            FormFieldView::new("email", "E-mail", "email")
                .with_value(&values.email)
                .with_errors(errors),
            FormFieldView::new("password", "Password", "password").with_errors(errors),
            FormFieldView::new("image_url", "(Optional) Image URL", "text")
                .with_value(&values.image_url)
                .with_errors(errors),
        ],
    }
}

fn login_form(values: &LoginForm, errors: &FieldErrors) -> FormView {
    FormView {
        heading: "Welcome back.",
        action: "/login".to_string(),
        submit_label: "Log in",
        fields: vec![
            FormFieldView::new("username", "Username", "text")
                .with_value(&values.username)
                .with_errors(errors),
            FormFieldView::new("password", "Password", "password").with_errors(errors),
        ],
    }
}

fn render_form(session: Session, viewer: &Viewer, form: FormView) -> Response {
    render_page(session, viewer.user(), StatusCode::OK, |chrome| {
        AccountFormTemplate {
            view: LayoutContext::new(chrome, form),
        }
    })
}

pub(super) async fn signup_page(Extension(viewer): Extension<Viewer>, session: Session) -> Response {
    let form = signup_form(&SignupForm::default(), &FieldErrors::new());
    render_form(session, &viewer, form)
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Response {
    const SOURCE: &str = "infra::http::auth::signup_submit";

    let input = SignupInput {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
        image_url: Some(form.image_url.clone()),
    };

    match state.accounts.signup(input).await {
        Ok(user) => (session.login(user.id), Redirect::to("/")).into_response(),
        Err(AccountError::Domain(DomainError::Validation(errors))) => {
            render_form(session, &viewer, signup_form(&form, &errors))
        }
        Err(AccountError::UsernameTaken) => render_form(
            session.flash(FlashCategory::Danger, "Username already taken"),
            &viewer,
            signup_form(&form, &FieldErrors::new()),
        ),
        Err(AccountError::EmailTaken) => render_form(
            session.flash(FlashCategory::Danger, "Email already taken"),
            &viewer,
            signup_form(&form, &FieldErrors::new()),
        ),
        Err(err) => err.into_http(SOURCE).into_response(),
    }
}

pub(super) async fn login_page(Extension(viewer): Extension<Viewer>, session: Session) -> Response {
    let form = login_form(&LoginForm::default(), &FieldErrors::new());
    render_form(session, &viewer, form)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    const SOURCE: &str = "infra::http::auth::login_submit";

    let input = LoginInput {
        username: form.username.clone(),
        password: form.password.clone(),
    };

    match state.accounts.authenticate(input).await {
        Ok(Some(user)) => {
            let session = session
                .login(user.id)
                .flash(FlashCategory::Success, format!("Hello, {}!", user.username));
            (session, Redirect::to("/")).into_response()
        }
        Ok(None) => render_form(
            session.flash(FlashCategory::Danger, "Invalid credentials."),
            &viewer,
            login_form(&form, &FieldErrors::new()),
        ),
        Err(AccountError::Domain(DomainError::Validation(errors))) => {
            render_form(session, &viewer, login_form(&form, &errors))
        }
        Err(err) => err.into_http(SOURCE).into_response(),
    }
}

pub(super) async fn logout(Extension(viewer): Extension<Viewer>, session: Session) -> Response {
    if let Some(user) = viewer.user() {
        info!(
            target = "warbler::accounts",
            user_id = user.id,
            "user logged out"
        );
    }

    let session = session
        .logout()
        .flash(FlashCategory::Success, "You successfully logged out!");
    (session, Redirect::to("/login")).into_response()
}
