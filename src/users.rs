//! Users Module
//!
//! The `users.user` record type and a manager for creating accounts.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::info;

use crate::error::{RecordError, Result};
use crate::model::{FieldKind, Fields, Record, RecordType, COUNTRY_FIELD, TIMEZONE_FIELD};
use crate::store::Storage;

pub const USER_APP_LABEL: &str = "users";
pub const USER_MODEL: &str = "user";

/// Account state managed by [`UserManager`], never taken from caller input.
pub const ACCOUNT_FIELDS: [&str; 4] = ["is_active", "is_staff", "is_superuser", "last_login"];

/// Schema of `users.user`.
pub fn user_type() -> Result<RecordType> {
    RecordType::builder(USER_APP_LABEL, USER_MODEL)
        .verbose_name("User")
        .field("email", FieldKind::Text)
        .field("username", FieldKind::Text)
        .field("first_name", FieldKind::Text)
        .field("last_name", FieldKind::Text)
        .field("is_active", FieldKind::Boolean)
        .field("is_staff", FieldKind::Boolean)
        .field("is_superuser", FieldKind::Boolean)
        .field("last_login", FieldKind::DateTime)
        .cache_token(["email", "username", "first_name", "last_name"])
        .with_log()
        .with_geo()
        .display_field("email")
        .exclude_from_serialization([
            "is_active",
            "is_staff",
            "is_superuser",
            "last_login",
            TIMEZONE_FIELD,
            COUNTRY_FIELD,
        ])
        .build()
}

// == User ==
/// A record of type `users.user`.
#[derive(Debug, Clone)]
pub struct User {
    record: Record,
}

impl User {
    pub fn from_record(record: Record) -> Result<Self> {
        let record_type = record.record_type();
        if record_type.app_label() != USER_APP_LABEL || record_type.model() != USER_MODEL {
            return Err(RecordError::InvalidRequest(format!(
                "`{}` is not a user record",
                record_type.table()
            )));
        }
        Ok(Self { record })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    fn text(&self, field: &str) -> &str {
        self.record.field_str(field).unwrap_or_default()
    }

    pub fn email(&self) -> &str {
        self.text("email")
    }

    pub fn short_name(&self) -> &str {
        self.text("username")
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.text("first_name"), self.text("last_name"))
            .trim()
            .to_string()
    }

    /// Full name, or the username when no name is set.
    pub fn name(&self) -> String {
        let full = self.full_name();
        if full.is_empty() {
            self.short_name().to_string()
        } else {
            full
        }
    }

    /// `Name <email>` when a name is known, the bare address otherwise.
    pub fn as_email_recipient(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            self.email().to_string()
        } else {
            format!("{} <{}>", name, self.email())
        }
    }

    /// The stored time zone name, empty when unset.
    ///
    /// Use [`Record::get_timezone`] for a zone that defaults to UTC.
    pub fn get_timezone_string(&self) -> &str {
        self.text(TIMEZONE_FIELD)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if name.is_empty() {
            f.write_str(self.email())
        } else {
            f.write_str(&name)
        }
    }
}

// == User Manager ==
#[derive(Debug, Clone)]
pub struct UserManager {
    user_type: Arc<RecordType>,
}

impl UserManager {
    pub fn new(user_type: Arc<RecordType>) -> Self {
        Self { user_type }
    }

    pub fn user_type(&self) -> &Arc<RecordType> {
        &self.user_type
    }

    /// Creates and saves an active user.
    ///
    /// `last_login` is stamped with the creation time. `extra_fields` may
    /// not touch [`ACCOUNT_FIELDS`].
    pub fn create_user<S: Storage + ?Sized>(
        &self,
        store: &mut S,
        email: &str,
        extra_fields: Fields,
    ) -> Result<User> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RecordError::InvalidRequest(
                "A valid email is required.".to_string(),
            ));
        }
        if let Some(field) = extra_fields
            .keys()
            .find(|key| ACCOUNT_FIELDS.contains(&key.as_str()))
        {
            return Err(RecordError::InvalidRequest(format!(
                "`{}` cannot be set when creating a user",
                field
            )));
        }

        let mut record = Record::new(self.user_type.clone());
        record.set("is_active", true)?;
        record.set("is_staff", false)?;
        record.set("is_superuser", false)?;
        record.set_many(extra_fields)?;
        record.set("email", email)?;
        record.set(
            "last_login",
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        )?;
        record.save(store)?;

        info!("Created user {}", email);
        User::from_record(record)
    }

    /// Creates a user with staff, active and superuser flags set.
    pub fn create_superuser<S: Storage + ?Sized>(
        &self,
        store: &mut S,
        email: &str,
        extra_fields: Fields,
    ) -> Result<User> {
        let mut user = self.create_user(store, email, extra_fields)?;
        let record = user.record_mut();
        record.set("is_staff", true)?;
        record.set("is_active", true)?;
        record.set("is_superuser", true)?;
        record.save(store)?;
        Ok(user)
    }
}
