mod remote;
mod settings;

use std::sync::Arc;

use crate::{config::AppConfig, dao::fallback::FallbackStore, services::settings_sync::GameSettingsSync};

pub use self::remote::RemoteSlot;
pub use self::settings::{SettingsSnapshot, SettingsState};

/// Handle to [`AppState`] cloned into every handler.
pub type SharedState = Arc<AppState>;

/// Central application state shared by the HTTP handlers and background tasks.
pub struct AppState {
    settings: Arc<GameSettingsSync>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a remote store is installed.
    pub fn new(config: &AppConfig, fallback: Arc<dyn FallbackStore>) -> SharedState {
        let settings = Arc::new(GameSettingsSync::new(config.into(), fallback));
        Arc::new(Self { settings })
    }

    /// The game settings sync component.
    pub fn settings(&self) -> &Arc<GameSettingsSync> {
        &self.settings
    }

    /// Handle to the remote store slot.
    pub fn remote(&self) -> &RemoteSlot {
        self.settings.remote()
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.remote().is_degraded()
    }
}
