//! API Module
//!
//! HTTP handlers and routing for the admin REST API.
//!
//! # Endpoints
//! - `POST /records/:app/:model` - Create a record
//! - `GET /records/:app/:model/:id` - Fetch a record
//! - `PATCH /records/:app/:model/:id` - Update a record
//! - `POST /records/:app/:model/:id/log` - Append to a record's change log
//! - `POST /users` - Create a user
//! - `GET /types` - List installed content types
//! - `GET /stats` - Storage statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
