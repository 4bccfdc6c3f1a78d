use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::GameSettingEntity, dto::validation::validate_game_name, state::SettingsSnapshot,
};

/// One game flag as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct GameSettingDto {
    /// Row identifier.
    pub id: String,
    /// Name of the game.
    pub game_name: String,
    /// Whether the game is enabled.
    pub is_enabled: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last mutation.
    pub updated_at: String,
}

impl From<GameSettingEntity> for GameSettingDto {
    fn from(entity: GameSettingEntity) -> Self {
        Self {
            id: entity.id,
            game_name: entity.game_name,
            is_enabled: entity.is_enabled,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Everything a client needs to render the game settings screen.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsView {
    /// Every known flag row.
    pub settings: Vec<GameSettingDto>,
    /// Whether a fetch is in flight.
    pub loading: bool,
    /// Human-readable message describing the last failure, if any.
    pub error: Option<String>,
    /// Whether the requesting user may change settings.
    pub is_admin: bool,
}

impl SettingsView {
    /// Build the view of `snapshot` for a caller whose admin status is `is_admin`.
    pub fn new(snapshot: &SettingsSnapshot, is_admin: bool) -> Self {
        Self {
            settings: snapshot
                .settings()
                .iter()
                .cloned()
                .map(Into::into)
                .collect(),
            loading: snapshot.loading(),
            error: snapshot.error().map(str::to_string),
            is_admin,
        }
    }
}

/// Answer to "is this game enabled?".
#[derive(Debug, Serialize, ToSchema)]
pub struct GameEnabledResponse {
    /// Name that was asked about.
    pub game_name: String,
    /// `false` for unknown games.
    pub is_enabled: bool,
}

/// Body of `PUT /settings/{game_name}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSettingRequest {
    /// New flag value.
    pub is_enabled: bool,
}

/// Path parameter naming a game.
#[derive(Debug, Deserialize, Validate)]
pub struct GameNamePath {
    /// Game named in the URL.
    #[validate(custom(function = "validate_game_name"))]
    pub game_name: String,
}
