mod auth;
mod home;
mod messages;
pub mod middleware;
pub mod session;
mod users;

pub use session::{Flash, FlashCategory, Session, SessionConfig};

use std::sync::Arc;

use askama::Template;
use axum::{
    Router,
    extract::{Extension, FromRef, FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sqlx::Error as SqlxError;

use crate::application::{
    accounts::{AccountError, AccountService},
    error::{ErrorReport, HttpError},
    feed::FeedService,
    messages::{MessageError, MessageService},
    repos::RepoError,
    social::{SocialError, SocialService},
};
use crate::domain::{entities::UserRecord, error::DomainError};
use crate::infra::{assets, db::PostgresRepositories};
use crate::presentation::views::{LayoutChrome, render_not_found_response, render_template_response};

use middleware::{
    Viewer, load_viewer, log_responses, no_cache_headers, require_user, set_request_context,
};

#[derive(Clone)]
pub struct HttpState {
    pub accounts: Arc<AccountService>,
    pub social: Arc<SocialService>,
    pub messages: Arc<MessageService>,
    pub feed: Arc<FeedService>,
    pub db: Arc<PostgresRepositories>,
    pub session: SessionConfig,
}

impl HttpState {
    /// Wire every service onto one set of Postgres repositories.
    pub fn new(repositories: PostgresRepositories, session: SessionConfig, feed_limit: u32) -> Self {
        let db = Arc::new(repositories);

        Self {
            accounts: Arc::new(AccountService::new(db.clone())),
            social: Arc::new(SocialService::new(
                db.clone(),
                db.clone(),
                db.clone(),
                db.clone(),
                feed_limit,
            )),
            messages: Arc::new(MessageService::new(db.clone(), db.clone())),
            feed: Arc::new(FeedService::new(db.clone(), db.clone(), feed_limit)),
            db,
            session,
        }
    }
}

impl FromRef<HttpState> for SessionConfig {
    fn from_ref(state: &HttpState) -> Self {
        state.session.clone()
    }
}

pub fn build_router(state: HttpState) -> Router {
    let protected = Router::new()
        .route("/users/{id}/following", get(users::following))
        .route("/users/{id}/followers", get(users::followers))
        .route("/users/{id}/likes", get(users::likes))
        .route("/users/follow/{id}", post(users::follow))
        .route("/users/stop-following/{id}", post(users::stop_following))
        .route(
            "/users/{id}/profile",
            get(users::edit_profile_page).post(users::edit_profile_submit),
        )
        .route("/users/delete", post(users::delete_account))
        .route(
            "/messages/new",
            get(messages::new_message_page).post(messages::new_message_submit),
        )
        .route("/messages/{id}/delete", post(messages::delete_message))
        .route("/users/add_like/{id}", post(messages::toggle_like))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_user,
        ));

    let pages = Router::new()
        .route("/", get(home::homepage))
        .route("/signup", get(auth::signup_page).post(auth::signup_submit))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout))
        .route("/users", get(users::index))
        .route("/users/{id}", get(users::show))
        .route("/messages/{id}", get(messages::show_message))
        .merge(protected)
        .fallback(not_found_fallback)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            load_viewer,
        ))
        .layer(axum_middleware::from_fn(no_cache_headers));

    let infrastructure = Router::new()
        .route("/_health/db", get(db_health))
        .route("/static/{*path}", get(assets::serve_static_asset));

    pages
        .merge(infrastructure)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// A numeric `{id}` path segment. Anything else renders the 404 page, the same
/// as an unknown path.
pub(crate) struct PathId(pub i64);

impl FromRequestParts<HttpState> for PathId {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(id)),
            Err(_) => {
                let session = Session::from_headers(&parts.headers, &state.session);
                let viewer = parts.extensions.get::<Viewer>().and_then(Viewer::user);
                Err(not_found_page(session, viewer))
            }
        }
    }
}

async fn not_found_fallback(Extension(viewer): Extension<Viewer>, session: Session) -> Response {
    not_found_page(session, viewer.user())
}

/// Render a full page, consuming any flashes queued in the session.
fn render_page<T, F>(
    session: Session,
    viewer: Option<&UserRecord>,
    status: StatusCode,
    build: F,
) -> Response
where
    T: Template,
    F: FnOnce(LayoutChrome) -> T,
{
    let (session, flashes) = session.take_flashes();
    let chrome = LayoutChrome::new(viewer, flashes.into_iter().map(Into::into).collect());
    (session, render_template_response(build(chrome), status)).into_response()
}

fn not_found_page(session: Session, viewer: Option<&UserRecord>) -> Response {
    let (session, flashes) = session.take_flashes();
    let chrome = LayoutChrome::new(viewer, flashes.into_iter().map(Into::into).collect());
    (session, render_not_found_response(chrome)).into_response()
}

fn forbidden(source: &'static str, detail: impl Into<String>) -> Response {
    HttpError::new(source, StatusCode::FORBIDDEN, "Access forbidden", detail).into_response()
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

fn domain_error_to_http(source: &'static str, err: DomainError) -> HttpError {
    match err {
        DomainError::NotFound { entity } => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            format!("{entity} not found"),
        ),
        DomainError::Validation(errors) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Invalid input",
            errors.to_string(),
        ),
    }
}

impl AccountError {
    pub(crate) fn into_http(self, source: &'static str) -> HttpError {
        match self {
            AccountError::Domain(err) => domain_error_to_http(source, err),
            AccountError::Repo(err) => repo_error_to_http(source, err),
            AccountError::UsernameTaken | AccountError::EmailTaken => HttpError::new(
                source,
                StatusCode::CONFLICT,
                "Account already exists",
                self.to_string(),
            ),
            AccountError::WrongPassword => HttpError::new(
                source,
                StatusCode::FORBIDDEN,
                "Access forbidden",
                self.to_string(),
            ),
            AccountError::Hash(err) => HttpError::from_error(
                source,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Account update failed",
                &err,
            ),
        }
    }
}

impl SocialError {
    pub(crate) fn into_http(self, source: &'static str) -> HttpError {
        match self {
            SocialError::Domain(err) => domain_error_to_http(source, err),
            SocialError::Repo(err) => repo_error_to_http(source, err),
        }
    }
}

impl MessageError {
    pub(crate) fn into_http(self, source: &'static str) -> HttpError {
        match self {
            MessageError::Domain(err) => domain_error_to_http(source, err),
            MessageError::Forbidden => HttpError::new(
                source,
                StatusCode::FORBIDDEN,
                "Access forbidden",
                self.to_string(),
            ),
            MessageError::Repo(err) => repo_error_to_http(source, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_health_is_empty_when_the_database_answers() {
        let response = db_health_response(Ok(()));

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.extensions().get::<ErrorReport>().is_none());
    }

    #[test]
    fn db_health_reports_an_unreachable_database() {
        let response = db_health_response(Err(SqlxError::PoolTimedOut));

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached");
        assert_eq!(report.source, "infra::http::db_health");
        assert_eq!(report.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn timeouts_map_to_service_unavailable() {
        let response = repo_error_to_http("tests", RepoError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
