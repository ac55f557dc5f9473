//! Recordkeeper - records with cache-invalidation tokens and change logs
//!
//! Record types declare which fields feed their cache token; saving a record
//! refreshes the token whenever one of those fields changed. Types with a
//! log field get an append-only, timestamped change log.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod models;
pub mod registry;
pub mod store;
pub mod tasks;
pub mod users;

pub use api::AppState;
pub use config::Config;
pub use error::{RecordError, Result};
pub use tasks::spawn_registry_refresh_task;
