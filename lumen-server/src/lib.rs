//! # Lumen Server
//!
//! HTTP surface for the Lumen media vault: multipart upload with
//! content-addressed dedup, file/thumbnail download, listing, search,
//! stats, and deletion. Built on axum with the engine from `lumen-core`
//! injected through [`state::AppState`].

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use routes::create_app;
pub use state::AppState;
