use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{
    StreamExt,
    future::{BoxFuture, join_all, ready},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use game_settings_sync::{
    auth::AuthUser,
    dao::{
        fallback::{FallbackStore, MemoryFallbackStore, load_settings, save_settings},
        models::{ChangeEvent, GameSettingEntity, NewGameSetting},
        settings_store::{ChangeStream, SettingsStore},
        storage::{StorageError, StorageResult},
    },
    services::{
        change_listener, storage_supervisor,
        settings_sync::{
            FetchOutcome, GameSettingsSync, LOAD_ERROR_MESSAGE, SyncOptions, UPDATE_ERROR_MESSAGE,
            UpdateOutcome,
        },
    },
};

const KEY: &str = "gameSettings";
const DEFAULT_GAMES: [&str; 6] = [
    "word_guess",
    "number_guess",
    "memory_game",
    "quiz_game",
    "word_search",
    "hangman_game",
];

fn row(id: &str, name: &str, enabled: bool) -> GameSettingEntity {
    GameSettingEntity {
        id: id.to_string(),
        game_name: name.to_string(),
        is_enabled: enabled,
        created_at: "2024-01-01T00:00:00Z".into(),
        updated_at: "2024-01-01T00:00:00Z".into(),
    }
}

fn offline() -> StorageError {
    StorageError::unavailable("offline".into(), io::Error::other("connection refused"))
}

/// Remote store double keeping rows in memory.
#[derive(Default)]
struct FakeStore {
    rows: Mutex<Vec<GameSettingEntity>>,
    inserted: Mutex<Vec<NewGameSetting>>,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
    fail_inserts: AtomicBool,
    /// Health checks still to fail before the store reports healthy.
    health_failures: AtomicUsize,
    /// Reconnect attempts still to fail before one succeeds.
    reconnect_failures: AtomicUsize,
    list_calls: AtomicUsize,
    subscriptions: AtomicUsize,
    feeds: Mutex<VecDeque<mpsc::UnboundedReceiver<ChangeEvent>>>,
}

impl FakeStore {
    fn with_rows(rows: Vec<GameSettingEntity>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            ..Self::default()
        })
    }

    /// Queue a change feed, handed out by the next `changes` call.
    fn feed(&self) -> mpsc::UnboundedSender<ChangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().push_back(rx);
        tx
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

/// Consume one injected failure, if any are left.
fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

impl SettingsStore for FakeStore {
    fn list_settings(&self) -> BoxFuture<'static, StorageResult<Vec<GameSettingEntity>>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_reads.load(Ordering::SeqCst) {
            Err(offline())
        } else {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.sort_by(|a, b| a.game_name.cmp(&b.game_name));
            Ok(rows)
        };
        Box::pin(ready(result))
    }

    fn update_setting(
        &self,
        game_name: String,
        is_enabled: bool,
        updated_at: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSettingEntity>>> {
        let result = if self.fail_updates.load(Ordering::SeqCst) {
            Err(offline())
        } else {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows
                .iter_mut()
                .filter(|row| row.game_name == game_name)
                .map(|row| {
                    row.is_enabled = is_enabled;
                    row.updated_at = updated_at.clone();
                    row.clone()
                })
                .collect())
        };
        Box::pin(ready(result))
    }

    fn insert_setting(
        &self,
        setting: NewGameSetting,
    ) -> BoxFuture<'static, StorageResult<GameSettingEntity>> {
        let result = if self.fail_inserts.load(Ordering::SeqCst) {
            Err(StorageError::Rejected("duplicate key".into()))
        } else {
            self.inserted.lock().unwrap().push(setting.clone());
            let mut rows = self.rows.lock().unwrap();
            let entity = setting.into_entity(format!("remote-{}", rows.len()));
            rows.push(entity.clone());
            Ok(entity)
        };
        Box::pin(ready(result))
    }

    fn changes(&self) -> BoxFuture<'static, StorageResult<ChangeStream>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let result: StorageResult<ChangeStream> = match self.feeds.lock().unwrap().pop_front() {
            Some(rx) => Ok(UnboundedReceiverStream::new(rx).map(Ok).boxed()),
            None => Err(offline()),
        };
        Box::pin(ready(result))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = if take_failure(&self.health_failures) {
            Err(offline())
        } else {
            Ok(())
        };
        Box::pin(ready(result))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = if take_failure(&self.reconnect_failures) {
            Err(offline())
        } else {
            Ok(())
        };
        Box::pin(ready(result))
    }
}

fn sync_with(fallback: Arc<MemoryFallbackStore>) -> Arc<GameSettingsSync> {
    Arc::new(GameSettingsSync::new(SyncOptions::default(), fallback))
}

fn names(rows: &[GameSettingEntity]) -> Vec<&str> {
    rows.iter().map(|row| row.game_name.as_str()).collect()
}

#[tokio::test]
async fn unknown_games_are_disabled() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    assert!(!sync.is_enabled("quiz_game").await);

    sync.fetch().await;
    assert!(!sync.is_enabled("chess").await);
}

#[tokio::test]
async fn remote_rows_replace_the_list_verbatim() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(vec![
        row("b", "quiz_game", true),
        row("a", "hangman_game", false),
    ]);
    sync.remote().install(store).await;

    assert_eq!(sync.fetch().await, FetchOutcome::Remote);

    let snapshot = sync.snapshot().await;
    assert_eq!(
        snapshot.settings(),
        [row("a", "hangman_game", false), row("b", "quiz_game", true)]
    );
    assert!(!snapshot.loading());
    assert!(snapshot.error().is_none());
    assert!(sync.is_enabled("quiz_game").await);
}

#[tokio::test]
async fn empty_remote_yields_empty_list() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    sync.remote().install(FakeStore::with_rows(Vec::new())).await;

    assert_eq!(sync.fetch().await, FetchOutcome::Remote);
    assert!(sync.settings().await.is_empty());
}

#[tokio::test]
async fn fallback_copy_is_migrated_and_written_back() {
    let fallback = Arc::new(MemoryFallbackStore::new());
    save_settings(
        fallback.as_ref(),
        KEY,
        &[
            row("local-0", "word_guess", true),
            row("local-1", "rock_paper_scissors", true),
        ],
    )
    .unwrap();

    let sync = sync_with(fallback.clone());
    let store = FakeStore::with_rows(Vec::new());
    store.fail_reads.store(true, Ordering::SeqCst);
    sync.remote().install(store).await;

    assert_eq!(sync.fetch().await, FetchOutcome::Fallback);

    let expected = vec![
        row("local-0", "word_guess", true),
        row("local-1", "word_search", true),
    ];
    assert_eq!(sync.settings().await, expected);
    assert_eq!(load_settings(fallback.as_ref(), KEY).unwrap(), Some(expected));
}

#[tokio::test]
async fn defaults_are_seeded_when_nothing_is_stored() {
    let fallback = Arc::new(MemoryFallbackStore::new());
    let sync = sync_with(fallback.clone());

    assert_eq!(sync.fetch().await, FetchOutcome::Defaults);

    let settings = sync.settings().await;
    assert_eq!(names(&settings), DEFAULT_GAMES);
    assert!(settings.iter().all(|row| !row.is_enabled));
    assert!(
        settings
            .iter()
            .all(|row| !row.created_at.is_empty() && !row.updated_at.is_empty())
    );
    assert_eq!(load_settings(fallback.as_ref(), KEY).unwrap(), Some(settings));
    assert!(!sync.snapshot().await.loading());
}

#[tokio::test]
async fn malformed_fallback_sets_load_error() {
    let fallback = Arc::new(MemoryFallbackStore::new());
    fallback.write(KEY, "definitely not json").unwrap();
    let sync = sync_with(fallback);

    assert_eq!(sync.fetch().await, FetchOutcome::Failed);

    let snapshot = sync.snapshot().await;
    assert_eq!(snapshot.error(), Some(LOAD_ERROR_MESSAGE));
    assert!(!snapshot.loading());
    assert!(snapshot.settings().is_empty());
}

#[tokio::test]
async fn failed_remote_update_patches_only_the_named_row() {
    let fallback = Arc::new(MemoryFallbackStore::new());
    let sync = sync_with(fallback.clone());
    sync.fetch().await;
    let before = sync.settings().await;

    let store = FakeStore::with_rows(Vec::new());
    store.fail_updates.store(true, Ordering::SeqCst);
    sync.remote().install(store).await;

    assert_eq!(sync.update("quiz_game", true).await, UpdateOutcome::LocalPatch);

    let after = sync.settings().await;
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(&after) {
        if new.game_name == "quiz_game" {
            assert!(new.is_enabled);
            assert_eq!(new.id, old.id);
        } else {
            assert_eq!(new, old);
        }
    }
    assert_eq!(load_settings(fallback.as_ref(), KEY).unwrap(), Some(after));
    assert!(sync.snapshot().await.error().is_none());
}

#[tokio::test]
async fn update_without_remote_store_patches_locally() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    sync.fetch().await;

    assert_eq!(sync.update("hangman_game", true).await, UpdateOutcome::LocalPatch);
    assert!(sync.is_enabled("hangman_game").await);
    assert!(!sync.is_enabled("word_guess").await);
}

#[tokio::test]
async fn update_of_missing_remote_row_inserts_it() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(vec![row("r-1", "word_guess", false)]);
    sync.remote().install(store.clone()).await;

    assert_eq!(sync.update("quiz_game", true).await, UpdateOutcome::Inserted);

    let inserted = store.inserted.lock().unwrap().clone();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].game_name, "quiz_game");
    assert!(inserted[0].is_enabled);
    // The update refetches, so the inserted row is visible right away.
    assert!(sync.is_enabled("quiz_game").await);
}

#[tokio::test]
async fn successful_update_refetches_from_remote() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(vec![row("r-1", "memory_game", false)]);
    sync.remote().install(store.clone()).await;
    sync.fetch().await;

    assert_eq!(sync.update("memory_game", true).await, UpdateOutcome::Updated);
    assert!(sync.is_enabled("memory_game").await);
    assert!(store.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_insert_surfaces_update_error() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(Vec::new());
    store.fail_inserts.store(true, Ordering::SeqCst);
    sync.remote().install(store).await;

    assert_eq!(sync.update("quiz_game", true).await, UpdateOutcome::Failed);
    assert_eq!(sync.snapshot().await.error(), Some(UPDATE_ERROR_MESSAGE));
}

#[tokio::test]
async fn change_notifications_are_merged_without_refetch() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(vec![
        row("r-1", "memory_game", false),
        row("r-2", "quiz_game", true),
    ]);
    let feed = store.feed();
    sync.remote().install(store.clone()).await;
    sync.fetch().await;

    // Remote rows changing behind our back must not show up unless notified.
    store.rows.lock().unwrap().clear();

    let _subscription = change_listener::subscribe(sync.clone());
    feed.send(ChangeEvent::Delete {
        game_name: Some("quiz_game".into()),
    })
    .unwrap();
    feed.send(ChangeEvent::Update(row("r-3", "chess", true))).unwrap();

    let mut watcher = sync.watch();
    tokio::time::timeout(
        Duration::from_secs(2),
        watcher.wait_for(|snapshot| names(snapshot.settings()) == ["memory_game", "chess"]),
    )
    .await
    .expect("change notifications applied in time")
    .unwrap();

    assert!(sync.is_enabled("chess").await);
    assert!(!sync.is_enabled("quiz_game").await);
}

#[tokio::test(start_paused = true)]
async fn listener_resubscribes_after_the_feed_ends() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(Vec::new());
    let first = store.feed();
    let second = store.feed();
    sync.remote().install(store.clone()).await;

    let _subscription = change_listener::subscribe(sync.clone());
    first
        .send(ChangeEvent::Insert(row("r-1", "quiz_game", true)))
        .unwrap();
    drop(first);
    second
        .send(ChangeEvent::Insert(row("r-2", "memory_game", true)))
        .unwrap();

    let mut watcher = sync.watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        watcher.wait_for(|snapshot| names(snapshot.settings()) == ["quiz_game", "memory_game"]),
    )
    .await
    .expect("second feed followed after the first one closed")
    .unwrap();

    assert_eq!(store.subscriptions.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn supervisor_refetches_once_storage_recovers() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));
    let store = FakeStore::with_rows(vec![row("r-1", "quiz_game", true)]);
    store.health_failures.store(1, Ordering::SeqCst);
    store.reconnect_failures.store(1, Ordering::SeqCst);

    let connected = store.clone();
    let supervisor = tokio::spawn(storage_supervisor::run(sync.clone(), move || {
        let store: Arc<dyn SettingsStore> = connected.clone();
        ready(Ok::<_, StorageError>(store))
    }));

    // One fetch on connect, one more once the failed reconnect is retried successfully.
    tokio::time::timeout(Duration::from_secs(30), async {
        while store.list_calls() < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("settings refetched after recovery");

    assert_eq!(store.health_failures.load(Ordering::SeqCst), 0);
    assert_eq!(store.reconnect_failures.load(Ordering::SeqCst), 0);
    assert!(!sync.remote().is_degraded());
    assert!(sync.is_enabled("quiz_game").await);

    // Healthy polls afterwards do not refetch again.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(store.list_calls(), 2);
    supervisor.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_offline_updates_keep_fallback_in_step() {
    let fallback = Arc::new(MemoryFallbackStore::new());
    let sync = sync_with(fallback.clone());
    sync.fetch().await;

    let updates = DEFAULT_GAMES.map(|game| {
        let sync = sync.clone();
        tokio::spawn(async move { sync.update(game, true).await })
    });
    for outcome in join_all(updates).await {
        assert_eq!(outcome.unwrap(), UpdateOutcome::LocalPatch);
    }

    let settings = sync.settings().await;
    assert!(settings.iter().all(|row| row.is_enabled));
    assert_eq!(load_settings(fallback.as_ref(), KEY).unwrap(), Some(settings));
}

#[tokio::test]
async fn admin_flag_follows_the_injected_session() {
    let sync = sync_with(Arc::new(MemoryFallbackStore::new()));

    assert!(sync.is_admin(&AuthUser::with_role("admin")));
    assert!(!sync.is_admin(&AuthUser::with_role("player")));
    assert!(!sync.is_admin(&None::<AuthUser>));

    let view = sync.view(&AuthUser::with_role("admin")).await;
    assert!(view.is_admin);
    assert!(view.loading);
}
