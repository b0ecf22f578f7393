//! Axum route handlers.

pub mod predictions;

/// Service banner.
pub async fn root() -> &'static str {
    "ML-IDS API"
}

pub async fn health() -> &'static str {
    "OK"
}
