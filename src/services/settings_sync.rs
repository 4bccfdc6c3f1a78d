//! Keeps the game settings in sync between the remote store, the local fallback copy and the
//! in-memory view served to clients.
//!
//! Remote calls never hold the state lock, so fetches, updates and change notifications may
//! interleave; each individual mutation is atomic and the last one to land wins. Writes to the
//! fallback copy happen under the lock, so the copy always matches the list it was taken from.

use std::{cmp::Ordering, sync::Arc};

use indexmap::IndexMap;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{self, AuthContext},
    config::AppConfig,
    dao::{
        fallback::{FallbackError, FallbackStore, load_settings, save_settings},
        models::{ChangeEvent, GameSettingEntity, NewGameSetting, now_timestamp},
        storage::StorageError,
    },
    dto::settings::SettingsView,
    state::{RemoteSlot, SettingsSnapshot, SettingsState},
};

/// Message exposed to clients when settings could not be loaded from any source.
pub const LOAD_ERROR_MESSAGE: &str = "failed to load game settings";
/// Message exposed to clients when an update could not be applied anywhere.
pub const UPDATE_ERROR_MESSAGE: &str = "failed to update game setting";

/// Static inputs of the sync component.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Games seeded (disabled) when no store has any data yet.
    pub games: Vec<String>,
    /// Retired game names and their replacements, applied to the fallback copy.
    pub retired_games: IndexMap<String, String>,
    /// Key of the settings list in the fallback store.
    pub fallback_key: String,
    /// Role granting the right to change settings.
    pub admin_role: String,
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            games: config.games().to_vec(),
            retired_games: config.retired_games().clone(),
            fallback_key: config.fallback_key().to_string(),
            admin_role: config.admin_role().to_string(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        (&AppConfig::default()).into()
    }
}

/// Where the list installed by [`GameSettingsSync::fetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows listed by the remote store.
    Remote,
    /// Stored fallback copy, after migrating retired game names.
    Fallback,
    /// Nothing stored anywhere; the default list was synthesized and persisted.
    Defaults,
    /// The fallback copy could not be read or written; the list was left untouched.
    Failed,
}

/// How [`GameSettingsSync::update`] applied the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// An existing remote row was updated.
    Updated,
    /// No remote row matched, so a new one was inserted.
    Inserted,
    /// The remote store failed; the in-memory list and fallback copy were patched instead.
    LocalPatch,
    /// Nothing could be applied; the state carries the update error.
    Failed,
}

/// Internal failures, turned into user-facing messages at the operation boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading or writing the fallback copy failed.
    #[error(transparent)]
    Fallback(#[from] FallbackError),
    /// The remote store refused to create a missing row.
    #[error("failed to insert game setting")]
    Insert(#[source] StorageError),
}

/// The game settings sync component.
pub struct GameSettingsSync {
    remote: RemoteSlot,
    fallback: Arc<dyn FallbackStore>,
    options: SyncOptions,
    state: RwLock<SettingsState>,
    snapshots: watch::Sender<SettingsSnapshot>,
}

impl GameSettingsSync {
    /// Start empty and loading, with no remote store installed.
    pub fn new(options: SyncOptions, fallback: Arc<dyn FallbackStore>) -> Self {
        let initial = SettingsState::default();
        let (snapshots, _rx) = watch::channel(initial.clone());
        Self {
            remote: RemoteSlot::new(),
            fallback,
            options,
            state: RwLock::new(initial),
            snapshots,
        }
    }

    /// Slot holding the remote store handle.
    pub fn remote(&self) -> &RemoteSlot {
        &self.remote
    }

    /// Observe every state change.
    pub fn watch(&self) -> watch::Receiver<SettingsSnapshot> {
        self.snapshots.subscribe()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> SettingsSnapshot {
        self.state.read().await.clone()
    }

    /// Current list of rows.
    pub async fn settings(&self) -> Vec<GameSettingEntity> {
        self.state.read().await.settings().to_vec()
    }

    /// Whether `game_name` is enabled; unknown games are disabled.
    pub async fn is_enabled(&self, game_name: &str) -> bool {
        self.state.read().await.is_enabled(game_name)
    }

    /// Whether the user exposed by `auth` is an admin, evaluated on every call.
    pub fn is_admin(&self, auth: &dyn AuthContext) -> bool {
        auth::is_admin(auth, &self.options.admin_role)
    }

    /// Everything a client needs to render the settings.
    pub async fn view(&self, auth: &dyn AuthContext) -> SettingsView {
        SettingsView::new(&self.snapshot().await, self.is_admin(auth))
    }

    /// Reload the list from the remote store, or from the fallback copy when it is unavailable.
    ///
    /// `loading` is cleared on return whatever the outcome.
    pub async fn fetch(&self) -> FetchOutcome {
        self.mutate(SettingsState::begin_loading).await;
        let loaded = self.load().await;

        self.mutate(|state| {
            let installed = loaded.and_then(|(outcome, settings)| {
                if outcome != FetchOutcome::Remote {
                    self.persist(&settings)?;
                }
                debug!(?outcome, count = settings.len(), "game settings loaded");
                state.replace(settings);
                Ok(outcome)
            });
            state.finish_loading();

            installed.unwrap_or_else(|err| {
                error!(error = %err, "error fetching game settings");
                state.set_error(LOAD_ERROR_MESSAGE);
                FetchOutcome::Failed
            })
        })
        .await
    }

    /// Alias of [`Self::fetch`] exposed to clients.
    pub async fn refetch(&self) -> FetchOutcome {
        self.fetch().await
    }

    /// Set the flag of `game_name`, creating the remote row when it does not exist yet.
    ///
    /// Failures never propagate: they are logged and surface as the state's error message.
    pub async fn update(&self, game_name: &str, is_enabled: bool) -> UpdateOutcome {
        self.mutate(SettingsState::clear_error).await;
        info!(game_name, is_enabled, "updating game setting");

        match self.try_update(game_name, is_enabled).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(game_name, error = %err, "error updating game setting");
                self.mutate(|state| state.set_error(UPDATE_ERROR_MESSAGE))
                    .await;
                UpdateOutcome::Failed
            }
        }
    }

    /// Merge a change notification pushed by the remote store.
    pub async fn apply_change(&self, event: ChangeEvent) {
        debug!(game_name = ?event.game_name(), "applying game setting change");
        self.mutate(|state| state.apply_change(event)).await;
    }

    async fn load(&self) -> Result<(FetchOutcome, Vec<GameSettingEntity>), SyncError> {
        let remote = match self.remote.require().await {
            Ok(store) => store.list_settings().await,
            Err(err) => Err(err),
        };

        match remote {
            Ok(settings) => Ok((FetchOutcome::Remote, settings)),
            Err(err) => {
                warn!(error = %err, "remote store not available, using fallback store");
                self.load_fallback()
            }
        }
    }

    /// Stored copy after migration, or the defaults; the caller writes either back.
    fn load_fallback(&self) -> Result<(FetchOutcome, Vec<GameSettingEntity>), SyncError> {
        match load_settings(self.fallback.as_ref(), &self.options.fallback_key)? {
            Some(stored) => Ok((
                FetchOutcome::Fallback,
                migrate_retired_games(stored, &self.options.retired_games),
            )),
            None => Ok((
                FetchOutcome::Defaults,
                default_settings(&self.options.games),
            )),
        }
    }

    fn persist(&self, settings: &[GameSettingEntity]) -> Result<(), FallbackError> {
        save_settings(self.fallback.as_ref(), &self.options.fallback_key, settings)
    }

    async fn try_update(
        &self,
        game_name: &str,
        is_enabled: bool,
    ) -> Result<UpdateOutcome, SyncError> {
        let updated_at = now_timestamp();
        let remote = match self.remote.require().await {
            Ok(store) => store
                .update_setting(game_name.to_string(), is_enabled, updated_at.clone())
                .await
                .map(|rows| (store, rows)),
            Err(err) => Err(err),
        };

        let (store, rows) = match remote {
            Ok(updated) => updated,
            Err(err) => {
                warn!(game_name, error = %err, "remote store not available, patching fallback store");
                self.mutate(|state| {
                    if !state.patch(game_name, is_enabled, &updated_at) {
                        debug!(game_name, "no local row to patch");
                    }
                    self.persist(state.settings())
                })
                .await?;
                return Ok(UpdateOutcome::LocalPatch);
            }
        };

        let outcome = if rows.is_empty() {
            let inserted = store
                .insert_setting(NewGameSetting::now(game_name, is_enabled))
                .await
                .map_err(SyncError::Insert)?;
            debug!(id = %inserted.id, game_name, "inserted missing game setting");
            UpdateOutcome::Inserted
        } else {
            debug!(game_name, rows = rows.len(), "game setting updated");
            UpdateOutcome::Updated
        };

        self.fetch().await;
        Ok(outcome)
    }

    /// Apply `f` to the state under the write lock, then publish the new snapshot.
    async fn mutate<R>(&self, f: impl FnOnce(&mut SettingsState) -> R) -> R {
        let mut guard = self.state.write().await;
        let result = f(&mut *guard);
        self.snapshots.send_replace(guard.clone());
        result
    }
}

/// Rename rows whose game was retired.
///
/// When the replacement already has a row, only the most recently updated of the two is kept;
/// on a tie the replacement row wins.
pub fn migrate_retired_games(
    settings: Vec<GameSettingEntity>,
    retired: &IndexMap<String, String>,
) -> Vec<GameSettingEntity> {
    // Each kept row remembers whether it was renamed from a retired game.
    let mut migrated: Vec<(GameSettingEntity, bool)> = Vec::with_capacity(settings.len());

    for mut setting in settings {
        let renamed = match retired.get(&setting.game_name) {
            Some(replacement) => {
                info!(
                    retired = %setting.game_name,
                    replacement = %replacement,
                    "migrating retired game setting"
                );
                setting.game_name = replacement.clone();
                true
            }
            None => false,
        };

        match migrated
            .iter_mut()
            .find(|(kept, _)| kept.game_name == setting.game_name)
        {
            Some((kept, kept_renamed)) => {
                let newer = match last_updated(&setting).cmp(&last_updated(kept)) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => *kept_renamed && !renamed,
                };
                let kept_id = if newer { &setting.id } else { &kept.id };
                info!(
                    game_name = %setting.game_name,
                    kept = %kept_id,
                    "dropping duplicate game setting left by a retired game"
                );
                if newer {
                    *kept = setting;
                    *kept_renamed = renamed;
                }
            }
            None => migrated.push((setting, renamed)),
        }
    }

    migrated.into_iter().map(|(setting, _)| setting).collect()
}

/// Unparsable timestamps sort before every valid one.
fn last_updated(setting: &GameSettingEntity) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(&setting.updated_at, &Rfc3339).ok()
}

/// Synthesize the default list: every game disabled, `local-<index>` ids, both timestamps now.
pub fn default_settings(games: &[String]) -> Vec<GameSettingEntity> {
    let now = now_timestamp();
    games
        .iter()
        .enumerate()
        .map(|(index, game)| GameSettingEntity::local(index, game.as_str(), &now))
        .collect()
}
