/// CouchDB implementation of [`SettingsStore`].
#[cfg(feature = "couch-store")]
pub mod couchdb;

use crate::dao::models::{ChangeEvent, GameSettingEntity, NewGameSetting};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// Live feed of change notifications emitted by a remote store.
pub type ChangeStream = BoxStream<'static, StorageResult<ChangeEvent>>;

/// Abstraction over the remote source of truth for game settings.
pub trait SettingsStore: Send + Sync {
    /// All rows ordered by `game_name`.
    fn list_settings(&self) -> BoxFuture<'static, StorageResult<Vec<GameSettingEntity>>>;
    /// Set `is_enabled`/`updated_at` on the row named `game_name`, returning the affected rows.
    fn update_setting(
        &self,
        game_name: String,
        is_enabled: bool,
        updated_at: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSettingEntity>>>;
    /// Create a row, returning it with the identifier the store assigned.
    fn insert_setting(
        &self,
        setting: NewGameSetting,
    ) -> BoxFuture<'static, StorageResult<GameSettingEntity>>;
    /// Open a change subscription starting from the current point in time.
    fn changes(&self) -> BoxFuture<'static, StorageResult<ChangeStream>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
