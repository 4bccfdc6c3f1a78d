/// Healthcheck payloads.
pub mod health;
/// Settings views and update payloads.
pub mod settings;
/// SSE event envelope.
pub mod sse;
pub mod validation;
