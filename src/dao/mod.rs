/// Local persisted copy used when the remote store is unreachable.
pub mod fallback;
/// Database model definitions.
pub mod models;
/// Remote source of truth for game settings.
pub mod settings_store;
/// Storage abstraction layer for database operations.
pub mod storage;
