//! Axum HTTP API for the generation broker.
//!
//! This crate provides:
//! - The single action endpoint (auth, translate, sync generation, job submission, polling)
//! - Shared-secret authentication with constant-time comparison
//! - Rate limiting, request ids and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod polling;
pub mod request;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use dispatch::Dispatcher;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
