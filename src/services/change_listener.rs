//! Live subscription to the remote store's change feed.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::services::settings_sync::GameSettingsSync;

const INITIAL_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Handle on the background task forwarding change notifications.
///
/// Dropping it unsubscribes; fetches and updates already in flight are not cancelled.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop listening for change notifications.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start forwarding the remote store's change notifications into `sync`.
pub fn subscribe(sync: Arc<GameSettingsSync>) -> Subscription {
    Subscription {
        task: tokio::spawn(listen(sync)),
    }
}

/// Follow the change feed of whichever store is installed, resubscribing with backoff when the
/// feed ends or fails.
async fn listen(sync: Arc<GameSettingsSync>) {
    let mut degraded = sync.remote().degraded_watcher();
    let mut delay = INITIAL_DELAY;

    loop {
        let Some(store) = sync.remote().current().await else {
            // Wait for the supervisor to install a store.
            if degraded.changed().await.is_err() {
                return;
            }
            continue;
        };

        match store.changes().await {
            Ok(mut changes) => {
                info!("subscribed to game settings changes");
                delay = INITIAL_DELAY;
                while let Some(change) = changes.next().await {
                    match change {
                        Ok(event) => sync.apply_change(event).await,
                        Err(err) => {
                            warn!(error = %err, "game settings change feed failed");
                            break;
                        }
                    }
                }
                info!("game settings change feed closed; resubscribing");
            }
            Err(err) => warn!(error = %err, "failed to subscribe to game settings changes"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
