use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the remote store and report whether the service is degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.remote().require().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let settings = state.settings().settings().await.len();
    if state.is_degraded() {
        HealthResponse::degraded(settings)
    } else {
        HealthResponse::ok(settings)
    }
}
