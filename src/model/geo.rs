//! Geo Module
//!
//! Time zone and country helpers for record types built `with_geo()`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::Result;
use crate::model::{Record, COUNTRY_FIELD, TIMEZONE_FIELD};

impl Record {
    // == Time Zone ==
    /// The record's time zone, UTC when unset or when the type has no
    /// `timezone` field.
    pub fn get_timezone(&self) -> Tz {
        match self.field_str(TIMEZONE_FIELD).filter(|s| !s.is_empty()) {
            None => Tz::UTC,
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!(
                    "{} has unknown time zone `{}`; using UTC",
                    self.as_str_fallback(),
                    name
                );
                Tz::UTC
            }),
        }
    }

    /// IANA name of [`Record::get_timezone`].
    pub fn get_timezone_string(&self) -> String {
        self.get_timezone().name().to_string()
    }

    pub fn set_timezone(&mut self, tz: Tz) -> Result<()> {
        self.set(TIMEZONE_FIELD, tz.name())
    }

    /// Current time in the record's time zone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.get_timezone())
    }

    // == Country ==
    /// ISO 3166-1 alpha-2 code, `None` while blank.
    pub fn country(&self) -> Option<&str> {
        self.field_str(COUNTRY_FIELD).filter(|c| !c.is_empty())
    }

    pub fn set_country(&mut self, code: &str) -> Result<()> {
        self.set(COUNTRY_FIELD, code)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Offset;
    use serde_json::Value;

    use super::*;
    use crate::error::RecordError;
    use crate::model::{FieldKind, RecordType};
    use crate::store::MemoryStore;

    fn member_type() -> Arc<RecordType> {
        Arc::new(
            RecordType::builder("club", "member")
                .field("name", FieldKind::Text)
                .with_geo()
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_timezone_defaults_to_utc() {
        let record = Record::new(member_type());
        assert_eq!(record.get_timezone(), Tz::UTC);
        assert_eq!(record.get_timezone_string(), "UTC");
        assert!(record.country().is_none());
    }

    #[test]
    fn test_set_timezone_and_now() {
        let mut store = MemoryStore::new();
        let mut record = Record::new(member_type());
        record.set_timezone(chrono_tz::Asia::Tokyo).unwrap();
        record.save(&mut store).unwrap();

        let loaded = Record::get(&mut store, member_type(), 1).unwrap();
        assert_eq!(loaded.get_timezone(), chrono_tz::Asia::Tokyo);
        assert_eq!(loaded.get_timezone_string(), "Asia/Tokyo");

        let now = loaded.now();
        assert_eq!(now.timezone(), chrono_tz::Asia::Tokyo);
        assert_eq!(now.offset().fix().local_minus_utc(), 9 * 3600);
        assert!((now.with_timezone(&Utc) - Utc::now()).num_seconds().abs() < 5);
    }

    #[test]
    fn test_invalid_zone_and_country_rejected() {
        let mut record = Record::new(member_type());

        assert!(matches!(
            record.set(TIMEZONE_FIELD, "Mars/Olympus"),
            Err(RecordError::InvalidRequest(_))
        ));
        assert!(record.set_country("France").is_err());

        record.set_country("FR").unwrap();
        assert_eq!(record.country(), Some("FR"));
    }

    #[test]
    fn test_unknown_stored_zone_falls_back_to_utc() {
        let mut record = Record::new(member_type());
        record.put_field(TIMEZONE_FIELD, Value::String("Nowhere/Special".to_string()));
        assert_eq!(record.get_timezone(), Tz::UTC);
    }

    #[test]
    fn test_type_without_geo() {
        let rt = Arc::new(
            RecordType::builder("core", "tag")
                .field("label", FieldKind::Text)
                .build()
                .unwrap(),
        );
        let mut record = Record::new(rt);

        assert_eq!(record.get_timezone(), Tz::UTC);
        assert!(matches!(
            record.set_timezone(chrono_tz::Europe::Paris),
            Err(RecordError::UnknownField { .. })
        ));
    }
}
