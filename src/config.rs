//! Application-level configuration loading: known games, retired names and fallback location.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GAME_SETTINGS_CONFIG_PATH";
/// Key under which the fallback copy of the settings is stored.
pub const DEFAULT_FALLBACK_KEY: &str = "gameSettings";
const DEFAULT_FALLBACK_DIRECTORY: &str = "data";
const DEFAULT_ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    games: Vec<String>,
    retired_games: IndexMap<String, String>,
    fallback_directory: PathBuf,
    fallback_key: String,
    admin_role: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        games = app_config.games.len(),
                        "loaded game settings config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; omitted fields keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Game names seeded (all disabled) when no store holds any data yet.
    pub fn games(&self) -> &[String] {
        &self.games
    }

    /// Retired game names mapped to the name that replaced them.
    pub fn retired_games(&self) -> &IndexMap<String, String> {
        &self.retired_games
    }

    /// Directory of the on-disk fallback copy.
    pub fn fallback_directory(&self) -> &PathBuf {
        &self.fallback_directory
    }

    /// Key of the settings list inside the fallback store.
    pub fn fallback_key(&self) -> &str {
        &self.fallback_key
    }

    /// Value of `user_metadata.role` that grants admin rights.
    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            games: default_games(),
            retired_games: default_retired_games(),
            fallback_directory: PathBuf::from(DEFAULT_FALLBACK_DIRECTORY),
            fallback_key: DEFAULT_FALLBACK_KEY.to_string(),
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    games: Option<Vec<String>>,
    #[serde(default)]
    retired_games: Option<IndexMap<String, String>>,
    #[serde(default)]
    fallback: RawFallback,
    #[serde(default)]
    admin_role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFallback {
    directory: Option<PathBuf>,
    key: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            games: value.games.unwrap_or(defaults.games),
            retired_games: value.retired_games.unwrap_or(defaults.retired_games),
            fallback_directory: value
                .fallback
                .directory
                .unwrap_or(defaults.fallback_directory),
            fallback_key: value
                .fallback
                .key
                .filter(|key| !key.is_empty())
                .unwrap_or(defaults.fallback_key),
            admin_role: value.admin_role.unwrap_or(defaults.admin_role),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in list of games shipped with the binary.
fn default_games() -> Vec<String> {
    [
        "word_guess",
        "number_guess",
        "memory_game",
        "quiz_game",
        "word_search",
        "hangman_game",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_retired_games() -> IndexMap<String, String> {
    IndexMap::from([("rock_paper_scissors".to_string(), "word_search".to_string())])
}
