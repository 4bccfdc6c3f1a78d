/// Live subscription to remote change notifications.
pub mod change_listener;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Game settings synchronisation between remote, fallback and in-memory copies.
pub mod settings_sync;
/// Server-Sent Events streaming of settings snapshots.
pub mod sse_service;
/// Remote store connection supervisor with backoff.
pub mod storage_supervisor;
