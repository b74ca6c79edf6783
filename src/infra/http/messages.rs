use std::collections::HashSet;

use axum::{
    extract::{Extension, Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::messages::MessageError;
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::messages::MessageInput;
use crate::domain::validation::FieldErrors;
use crate::presentation::views::{
    FormFieldView, FormView, LayoutContext, MessageDetailView, MessageShowTemplate, MessageView,
    NewMessageTemplate, ViewerView,
};

use super::middleware::{CurrentUser, Viewer};
use super::{HttpState, PathId, Session, not_found_page, render_page};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct MessageForm {
    text: String,
}

fn message_form(values: &MessageForm, errors: &FieldErrors) -> FormView {
    FormView {
        heading: "What's happening?",
        action: "/messages/new".to_string(),
        submit_label: "Add my message!",
        fields: vec![
            FormFieldView::new("text", "Message", "textarea")
                .with_value(&values.text)
                .with_errors(errors),
        ],
    }
}

fn message_failure(
    source: &'static str,
    err: MessageError,
    session: Session,
    viewer: Option<&UserRecord>,
) -> Response {
    match err {
        MessageError::Domain(DomainError::NotFound { .. }) => not_found_page(session, viewer),
        other => other.into_http(source).into_response(),
    }
}

fn render_message_form(
    session: Session,
    user: &UserRecord,
    values: &MessageForm,
    errors: &FieldErrors,
) -> Response {
    let form = message_form(values, errors);
    render_page(session, Some(user), StatusCode::OK, |chrome| {
        NewMessageTemplate {
            view: LayoutContext::new(chrome, form),
        }
    })
}

pub(super) async fn new_message_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Response {
    render_message_form(session, &user, &MessageForm::default(), &FieldErrors::new())
}

pub(super) async fn new_message_submit(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    Form(form): Form<MessageForm>,
) -> Response {
    const SOURCE: &str = "infra::http::messages::new_message_submit";

    let input = MessageInput {
        text: form.text.clone(),
    };

    match state.messages.post(&user, input).await {
        Ok(_) => Redirect::to(&format!("/users/{}", user.id)).into_response(),
        Err(MessageError::Domain(DomainError::Validation(errors))) => {
            render_message_form(session, &user, &form, &errors)
        }
        Err(err) => message_failure(SOURCE, err, session, Some(&user)),
    }
}

pub(super) async fn show_message(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    session: Session,
    PathId(message_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::messages::show_message";

    let message = match state.messages.require(message_id).await {
        Ok(message) => message,
        Err(err) => return message_failure(SOURCE, err, session, viewer.user()),
    };
    let likers = match state.messages.likers(message_id).await {
        Ok(likers) => likers,
        Err(err) => return message_failure(SOURCE, err, session, viewer.user()),
    };

    let liked: HashSet<i64> = match viewer.user() {
        Some(user) if likers.iter().any(|liker| liker.id == user.id) => HashSet::from([message.id]),
        _ => HashSet::new(),
    };
    let content = MessageDetailView {
        message: MessageView::build(&message, viewer.user(), &liked),
        likers: likers.iter().map(ViewerView::from).collect(),
    };

    render_page(session, viewer.user(), StatusCode::OK, |chrome| {
        MessageShowTemplate {
            view: LayoutContext::new(chrome, content),
        }
    })
}

pub(super) async fn delete_message(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(message_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::messages::delete_message";

    match state.messages.delete(&user, message_id).await {
        Ok(()) => Redirect::to(&format!("/users/{}", user.id)).into_response(),
        Err(err) => message_failure(SOURCE, err, session, Some(&user)),
    }
}

pub(super) async fn toggle_like(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    PathId(message_id): PathId,
) -> Response {
    const SOURCE: &str = "infra::http::messages::toggle_like";

    match state.messages.toggle_like(&user, message_id).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => message_failure(SOURCE, err, session, Some(&user)),
    }
}
