use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{ChangeEvent, GameSettingEntity, NewGameSetting};

pub const SETTING_PREFIX: &str = "game_setting::";
pub const END_SUFFIX: &str = "\u{ffff}";

/// Document ids embed the game name so `_all_docs` returns rows sorted by name.
pub fn setting_doc_id(game_name: &str) -> String {
    format!("{SETTING_PREFIX}{game_name}")
}

/// Recover the game name from a document id, if it belongs to a settings document.
pub fn game_name_from_doc_id(doc_id: &str) -> Option<&str> {
    doc_id.strip_prefix(SETTING_PREFIX)
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSettingDocument {
    #[serde(rename = "_id")]
    pub doc_id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub setting: GameSettingEntity,
}

impl CouchSettingDocument {
    /// Wrap a new row with a freshly generated identifier.
    pub fn from_new(setting: NewGameSetting) -> Self {
        let setting = setting.into_entity(uuid::Uuid::new_v4().to_string());
        Self {
            doc_id: setting_doc_id(&setting.game_name),
            rev: None,
            setting,
        }
    }

    pub fn into_entity(self) -> GameSettingEntity {
        self.setting
    }

    /// CouchDB revisions start at `1-` when a document is first created.
    pub fn is_first_revision(&self) -> bool {
        self.rev.as_deref().is_some_and(|rev| rev.starts_with("1-"))
    }
}

impl ChangeRow {
    /// Translate a `_changes` row into an event, skipping rows outside the settings prefix.
    pub fn into_event(self) -> Result<Option<ChangeEvent>, serde_json::Error> {
        let Some(game_name) = game_name_from_doc_id(&self.id) else {
            return Ok(None);
        };

        if self.deleted {
            return Ok(Some(ChangeEvent::Delete {
                game_name: Some(game_name.to_string()),
            }));
        }

        let Some(doc) = self.doc else {
            return Ok(None);
        };
        let document: CouchSettingDocument = serde_json::from_value(doc)?;
        let event = if document.is_first_revision() {
            ChangeEvent::Insert(document.into_entity())
        } else {
            ChangeEvent::Update(document.into_entity())
        };
        Ok(Some(event))
    }
}
