use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// One flag row: whether a given game is enabled.
///
/// Field names match the serialized layout shared by the remote store and the
/// fallback copy, so existing fallback data keeps deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSettingEntity {
    /// Opaque identifier assigned by the remote store, or `local-<index>` when synthesized offline.
    pub id: String,
    /// Key of the row; unique among visible rows.
    pub game_name: String,
    /// Whether the game is currently enabled.
    #[serde(default)]
    pub is_enabled: bool,
    /// RFC 3339 timestamp set when the row was first written.
    #[serde(default)]
    pub created_at: String,
    /// RFC 3339 timestamp refreshed on every mutation.
    #[serde(default)]
    pub updated_at: String,
}

impl GameSettingEntity {
    /// Build a row synthesized locally, stamping both timestamps with `now`.
    pub fn local(index: usize, game_name: impl Into<String>, now: &str) -> Self {
        Self {
            id: format!("local-{index}"),
            game_name: game_name.into(),
            is_enabled: false,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

/// Row payload handed to the remote store on insert; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewGameSetting {
    /// Name of the game the row controls.
    pub game_name: String,
    /// Initial flag value.
    pub is_enabled: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp, equal to `created_at` for new rows.
    pub updated_at: String,
}

impl NewGameSetting {
    /// Fresh row for `game_name` with both timestamps set to the current time.
    pub fn now(game_name: impl Into<String>, is_enabled: bool) -> Self {
        let now = now_timestamp();
        Self {
            game_name: game_name.into(),
            is_enabled,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Attach the identifier chosen by the store.
    pub fn into_entity(self, id: impl Into<String>) -> GameSettingEntity {
        GameSettingEntity {
            id: id.into(),
            game_name: self.game_name,
            is_enabled: self.is_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Change notification pushed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A row was created.
    Insert(GameSettingEntity),
    /// An existing row was modified.
    Update(GameSettingEntity),
    /// A row was removed. The name is absent when the store could not tell which row it was.
    Delete { game_name: Option<String> },
}

impl ChangeEvent {
    /// Name of the row this event targets, if known.
    pub fn game_name(&self) -> Option<&str> {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => Some(&row.game_name),
            ChangeEvent::Delete { game_name } => game_name.as_deref(),
        }
    }
}

/// Current time formatted as an RFC 3339 string.
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
