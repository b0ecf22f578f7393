//! HTTP surface of the gateway.
//!
//! - `GET /`: service banner
//! - `GET /healthz`: liveness check
//! - `POST /api/predictions`: classify a split-JSON batch and notify per row

pub mod handlers;
