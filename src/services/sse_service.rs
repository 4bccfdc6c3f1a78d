use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{settings::SettingsView, sse::ServerEvent},
    state::SettingsSnapshot,
};

const EVENT_SETTINGS: &str = "settings";

/// Serialize a snapshot into the `settings` SSE event.
pub fn settings_event(snapshot: &SettingsSnapshot, is_admin: bool) -> Option<ServerEvent> {
    let view = SettingsView::new(snapshot, is_admin);
    match ServerEvent::json(Some(EVENT_SETTINGS.to_string()), &view) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize settings SSE payload");
            None
        }
    }
}

/// Convert a snapshot watcher into an SSE response: the current state is sent immediately,
/// then every later change, until the client disconnects.
pub fn to_sse_stream(
    mut receiver: watch::Receiver<SettingsSnapshot>,
    is_admin: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the watcher and pushes into mpsc
    tokio::spawn(async move {
        receiver.mark_changed();
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = receiver.borrow_and_update().clone();
                    let Some(payload) = settings_event(&snapshot, is_admin) else {
                        continue;
                    };

                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }

                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!("settings SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
