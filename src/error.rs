//! Error types for the record store
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::RecordId;

// == Record Error Enum ==
/// Unified error type for records, storage and the admin API.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record type does not declare a field an operation requires
    #[error("Record type `{record_type}` has no field named `{field}`")]
    MissingField { record_type: String, field: String },

    /// A value was assigned to a field the record type does not declare
    #[error("Unknown field `{field}` on `{record_type}`")]
    UnknownField { record_type: String, field: String },

    /// No record type is registered under the given name or id
    #[error("Unknown record type: {0}")]
    UnknownType(String),

    /// A record type definition is inconsistent
    #[error("Invalid record type: {0}")]
    InvalidRecordType(String),

    /// Row not found in storage
    #[error("{table} {id} not found")]
    NotFound { table: String, id: RecordId },

    /// Conditional write against a row that moved on
    #[error("{table} {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        table: String,
        id: RecordId,
        expected: u64,
        found: u64,
    },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecordError::NotFound { .. } | RecordError::UnknownType(_) => StatusCode::NOT_FOUND,
            RecordError::Conflict { .. } => StatusCode::CONFLICT,
            RecordError::MissingField { .. }
            | RecordError::UnknownField { .. }
            | RecordError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RecordError::InvalidRecordType(_) | RecordError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the record store.
pub type Result<T> = std::result::Result<T, RecordError>;
