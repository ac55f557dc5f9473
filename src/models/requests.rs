//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::model::{
    AppendConsistency, AppendOptions, Fields, CACHE_TOKEN_FIELD, CREATED_AT_FIELD, LOG_FIELD,
    UPDATED_AT_FIELD,
};
use crate::users::ACCOUNT_FIELDS;

/// Fields managed by the record itself and never written by clients.
const MANAGED_FIELDS: &[&str] = &[
    "id",
    CACHE_TOKEN_FIELD,
    LOG_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
];

fn default_true() -> bool {
    true
}

fn managed_field_error(fields: &Fields) -> Option<String> {
    fields
        .keys()
        .find(|name| MANAGED_FIELDS.contains(&name.as_str()))
        .map(|name| format!("Field `{}` cannot be written directly", name))
}

/// Request body for creating or updating a record
/// (POST /records/:app/:model, PATCH /records/:app/:model/:id)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WriteRecordRequest {
    /// Field values to assign
    #[serde(default)]
    pub fields: Fields,
}

impl WriteRecordRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        managed_field_error(&self.fields)
    }
}

/// Request body for appending to a record's log (POST /records/:app/:model/:id/log)
#[derive(Debug, Clone, Deserialize)]
pub struct AppendLogRequest {
    /// Entry body
    pub text: String,
    /// Optional bold title line
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default = "default_true")]
    pub use_transaction: bool,
    #[serde(default = "default_true")]
    pub reload_first: bool,
    /// Overrides the server's configured consistency
    #[serde(default)]
    pub consistency: Option<AppendConsistency>,
}

impl AppendLogRequest {
    pub fn validate(&self) -> Option<String> {
        if self.text.trim().is_empty() {
            return Some("Log text cannot be empty".to_string());
        }
        None
    }

    /// Append options, falling back to `default_consistency` when the
    /// request does not name one.
    pub fn to_options(&self, default_consistency: AppendConsistency) -> AppendOptions {
        AppendOptions {
            persist: self.persist,
            title: self.title.clone().filter(|t| !t.is_empty()),
            use_transaction: self.use_transaction,
            reload_first: self.reload_first,
            consistency: self.consistency.unwrap_or(default_consistency),
        }
    }
}

/// Request body for creating a user (POST /users)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    /// Create with staff and superuser flags set
    #[serde(default)]
    pub superuser: bool,
    /// Extra field values such as names
    #[serde(default)]
    pub fields: Fields,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Option<String> {
        if self.email.trim().is_empty() {
            return Some("A valid email is required.".to_string());
        }
        if self.fields.contains_key("email") {
            return Some("Pass `email` at the top level, not in `fields`".to_string());
        }
        if let Some(field) = self
            .fields
            .keys()
            .find(|key| ACCOUNT_FIELDS.contains(&key.as_str()))
        {
            return Some(format!("`{}` cannot be set when creating a user", field));
        }
        managed_field_error(&self.fields)
    }
}
