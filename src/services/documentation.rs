use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the game settings service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::settings::list_settings,
        crate::routes::settings::refetch_settings,
        crate::routes::settings::get_setting,
        crate::routes::settings::update_setting,
        crate::routes::sse::settings_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::settings::GameSettingDto,
            crate::dto::settings::SettingsView,
            crate::dto::settings::GameEnabledResponse,
            crate::dto::settings::UpdateSettingRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "settings", description = "Game enable/disable flags"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
/// OpenAPI document of the whole HTTP surface.
pub struct ApiDoc;
