//! Library crate for game-settings-sync, exposing modules for binaries and integration tests.

pub mod auth;
pub mod config;
/// Remote store, fallback copy and the row models they share.
pub mod dao;
/// Request and response payloads.
pub mod dto;
mod error;
/// HTTP route trees.
pub mod routes;
/// Sync component and the background tasks around it.
pub mod services;
/// Shared application state.
pub mod state;
