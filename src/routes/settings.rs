use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::info;
use validator::Validate;

use crate::{
    auth::RequestUser,
    dto::settings::{GameEnabledResponse, GameNamePath, SettingsView, UpdateSettingRequest},
    error::AppError,
    state::SharedState,
};

/// Routes reading and changing the game flags.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/settings", get(list_settings))
        .route("/settings/refetch", post(refetch_settings))
        .route("/settings/{game_name}", get(get_setting).put(update_setting))
}

/// Current settings together with the loading flag, last error and the caller's admin status.
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    params(("X-User-Role" = Option<String>, Header, description = "Role of the authenticated user")),
    responses((status = 200, description = "Current game settings", body = SettingsView))
)]
pub async fn list_settings(
    State(state): State<SharedState>,
    user: RequestUser,
) -> Json<SettingsView> {
    Json(state.settings().view(&user).await)
}

/// Reload the settings from the remote store (or the fallback copy when it is unavailable).
#[utoipa::path(
    post,
    path = "/settings/refetch",
    tag = "settings",
    params(("X-User-Role" = Option<String>, Header, description = "Role of the authenticated user")),
    responses((status = 200, description = "Settings after reloading", body = SettingsView))
)]
pub async fn refetch_settings(
    State(state): State<SharedState>,
    user: RequestUser,
) -> Json<SettingsView> {
    let outcome = state.settings().refetch().await;
    info!(?outcome, "game settings refetched");
    Json(state.settings().view(&user).await)
}

/// Whether a single game is enabled; unknown games are reported as disabled.
#[utoipa::path(
    get,
    path = "/settings/{game_name}",
    tag = "settings",
    params(("game_name" = String, Path, description = "Name of the game")),
    responses(
        (status = 200, description = "Flag of the game", body = GameEnabledResponse),
        (status = 400, description = "Invalid game name")
    )
)]
pub async fn get_setting(
    State(state): State<SharedState>,
    Path(params): Path<GameNamePath>,
) -> Result<Json<GameEnabledResponse>, AppError> {
    params.validate()?;
    let is_enabled = state.settings().is_enabled(&params.game_name).await;
    Ok(Json(GameEnabledResponse {
        game_name: params.game_name,
        is_enabled,
    }))
}

/// Enable or disable a game. Failures are reported through the `error` field of the view.
#[utoipa::path(
    put,
    path = "/settings/{game_name}",
    tag = "settings",
    params(
        ("X-User-Role" = String, Header, description = "Role of the authenticated user; must be admin"),
        ("game_name" = String, Path, description = "Name of the game")
    ),
    request_body = UpdateSettingRequest,
    responses(
        (status = 200, description = "Settings after the update", body = SettingsView),
        (status = 400, description = "Invalid game name"),
        (status = 401, description = "Caller is not an admin")
    )
)]
pub async fn update_setting(
    State(state): State<SharedState>,
    user: RequestUser,
    Path(params): Path<GameNamePath>,
    Json(payload): Json<UpdateSettingRequest>,
) -> Result<Json<SettingsView>, AppError> {
    params.validate()?;
    let settings = state.settings();
    if !settings.is_admin(&user) {
        return Err(AppError::Unauthorized(
            "only admins can change game settings".into(),
        ));
    }

    let outcome = settings
        .update(&params.game_name, payload.is_enabled)
        .await;
    info!(game_name = %params.game_name, ?outcome, "game setting update handled");
    Ok(Json(settings.view(&user).await))
}
