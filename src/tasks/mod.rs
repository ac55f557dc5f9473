//! Background Tasks Module
//!
//! Tasks that run periodically while the server is up.
//!
//! # Tasks
//! - Registry refresh: reloads the content type registry from the store

mod refresh;

pub use refresh::spawn_registry_refresh_task;
