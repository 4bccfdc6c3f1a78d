use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    auth::RequestUser,
    services::sse_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/settings",
    tag = "sse",
    params(("X-User-Role" = Option<String>, Header, description = "Role of the authenticated user")),
    responses((status = 200, description = "Settings SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream the settings view on connect and after every change.
pub async fn settings_stream(
    State(state): State<SharedState>,
    user: RequestUser,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let settings = state.settings();
    let is_admin = settings.is_admin(&user);
    info!(is_admin, "New settings SSE connection");
    sse_service::to_sse_stream(settings.watch(), is_admin)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/settings", get(settings_stream))
}
