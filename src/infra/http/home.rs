use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::presentation::views::{
    AnonHomeTemplate, HomeTemplate, HomeView, LayoutContext, MessageView,
};

use super::middleware::Viewer;
use super::{HttpState, Session, render_page, repo_error_to_http};

/// Landing page for visitors; the timeline for signed-in users.
pub(super) async fn homepage(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    session: Session,
) -> Response {
    let Some(user) = viewer.user() else {
        return render_page(session, None, StatusCode::OK, |chrome| AnonHomeTemplate {
            view: LayoutContext::new(chrome, ()),
        });
    };

    match state.feed.home(user).await {
        Ok(timeline) => {
            let content = HomeView {
                messages: MessageView::list(&timeline.messages, Some(user), &timeline.liked),
            };
            render_page(session, Some(user), StatusCode::OK, |chrome| HomeTemplate {
                view: LayoutContext::new(chrome, content),
            })
        }
        Err(err) => repo_error_to_http("infra::http::home::homepage", err).into_response(),
    }
}
