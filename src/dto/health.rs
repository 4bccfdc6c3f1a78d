use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether a remote store is installed and answering health checks.
    pub remote_connected: bool,
    /// Number of game settings currently served.
    pub settings: usize,
}

impl HealthResponse {
    /// Create a health response indicating the remote store is reachable.
    pub fn ok(settings: usize) -> Self {
        Self {
            status: "ok".to_string(),
            remote_connected: true,
            settings,
        }
    }

    /// Create a health response indicating the service runs on its fallback copy.
    pub fn degraded(settings: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            remote_connected: false,
            settings,
        }
    }
}
