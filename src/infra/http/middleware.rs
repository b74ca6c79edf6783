use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::domain::entities::UserRecord;

use super::HttpState;
use super::session::{FlashCategory, Session};

pub const UNAUTHORIZED_FLASH: &str = "Access unauthorized.";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// The user behind the session cookie, if any. Present on every page request.
#[derive(Clone, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

/// Inserted by [`require_user`]; handlers behind it can rely on a signed-in user.
#[derive(Clone)]
pub struct CurrentUser(pub UserRecord);

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "warbler::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "warbler::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

/// Rendered pages must never be served from a cache.
pub async fn no_cache_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

/// Resolve the session cookie to a user. A dangling id is treated as anonymous;
/// a failed lookup fails the request.
pub async fn load_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = Session::from_headers(request.headers(), &state.session);
    let user = match session.user_id() {
        Some(id) => match state.accounts.find_user(id).await {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    target = "warbler::http::session",
                    user_id = id,
                    error = %err,
                    "failed to load session user"
                );
                return err
                    .into_http("infra::http::middleware::load_viewer")
                    .into_response();
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Viewer(user));
    next.run(request).await
}

/// Gate for routes that need a signed-in user.
pub async fn require_user(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.0.clone());

    match user {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        None => {
            let session = Session::from_headers(request.headers(), &state.session)
                .flash(FlashCategory::Danger, UNAUTHORIZED_FLASH);
            (session, Redirect::to("/")).into_response()
        }
    }
}
