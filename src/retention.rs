use chrono::{NaiveDateTime, NaiveTime, Timelike};
use std::time::Duration;

use crate::db::{DbError, SqlitePool};
use crate::events::store::delete_events_older_than;

pub const DEFAULT_RETENTION_DAYS: i64 = 180;
/// Upper bound for `EVENTS_RETENTION_DAYS`, roughly a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

pub fn default_fire_at() -> NaiveTime {
    NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub retention_days: i64,
    pub fire_at: NaiveTime,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            fire_at: default_fire_at(),
        }
    }
}

impl RetentionConfig {
    /// Builds the config from raw setting values. Anything unparseable falls
    /// back to its default with a warning.
    pub fn from_values(
        enabled: Option<&str>,
        retention_days: Option<&str>,
        fire_at: Option<&str>,
    ) -> Self {
        let defaults = Self::default();

        let enabled = match enabled.map(|s| s.trim().to_lowercase()) {
            None => defaults.enabled,
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    tracing::warn!(value = %v, "Invalid cleanup enabled flag, using default");
                    defaults.enabled
                }
            },
        };

        let retention_days = match retention_days {
            None => defaults.retention_days,
            Some(v) => match v.trim().parse::<i64>() {
                Ok(days) if (1..=MAX_RETENTION_DAYS).contains(&days) => days,
                _ => {
                    tracing::warn!(
                        value = %v,
                        default = defaults.retention_days,
                        "Invalid retention days, using default"
                    );
                    defaults.retention_days
                }
            },
        };

        let fire_at = match fire_at {
            None => defaults.fire_at,
            Some(v) => parse_fire_at(v).unwrap_or_else(|| {
                tracing::error!(value = %v, "Invalid cleanup time, expected HH:MM, using 02:00");
                defaults.fire_at
            }),
        };

        Self {
            enabled,
            retention_days,
            fire_at,
        }
    }
}

/// Parses a 24h `HH:MM` wall-clock time.
pub fn parse_fire_at(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

fn minute_of(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// True when `now` is in the `fire_at` minute and the cleanup has not run
/// during that same minute yet.
pub fn should_fire(
    now: NaiveDateTime,
    fire_at: NaiveTime,
    last_fired: Option<NaiveDateTime>,
) -> bool {
    if now.hour() != fire_at.hour() || now.minute() != fire_at.minute() {
        return false;
    }
    last_fired.map(minute_of) != Some(minute_of(now))
}

/// Time left until the next wall-clock minute boundary.
pub fn until_next_minute(now: NaiveDateTime) -> Duration {
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    Duration::from_secs(60).saturating_sub(into_minute)
}

/// One cleanup pass. The caller decides what to do with a failure; the
/// scheduler logs it and waits for the next day.
pub fn run_cleanup_cycle(
    pool: &SqlitePool,
    config: &RetentionConfig,
    now: NaiveDateTime,
) -> Result<usize, DbError> {
    delete_events_older_than(pool, config.retention_days, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::events::store::test_support::{at, store};
    use crate::find_events_by_employee;

    #[test]
    fn test_defaults() {
        let config = RetentionConfig::default();
        assert!(config.enabled);
        assert_eq!(config.retention_days, 180);
        assert_eq!(config.fire_at, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
    }

    #[test]
    fn test_from_values_parses_valid_settings() {
        let config = RetentionConfig::from_values(Some("false"), Some("30"), Some("23:45"));
        assert!(!config.enabled);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.fire_at, NaiveTime::from_hms_opt(23, 45, 0).unwrap());
    }

    #[test]
    fn test_from_values_falls_back_on_invalid_settings() {
        let config = RetentionConfig::from_values(Some("maybe"), Some("0"), Some("25:00"));
        assert_eq!(config, RetentionConfig::default());

        let config = RetentionConfig::from_values(None, Some("-5"), Some("2pm"));
        assert_eq!(config, RetentionConfig::default());
    }

    #[test]
    fn test_from_values_caps_retention_days() {
        let config = RetentionConfig::from_values(None, Some("100000000"), None);
        assert_eq!(config.retention_days, DEFAULT_RETENTION_DAYS);

        let config = RetentionConfig::from_values(None, Some("36500"), None);
        assert_eq!(config.retention_days, MAX_RETENTION_DAYS);
    }

    #[test]
    fn test_parse_fire_at() {
        assert_eq!(
            parse_fire_at("02:00"),
            Some(NaiveTime::from_hms_opt(2, 0, 0).unwrap())
        );
        assert_eq!(
            parse_fire_at("7:05"),
            Some(NaiveTime::from_hms_opt(7, 5, 0).unwrap())
        );
        assert_eq!(parse_fire_at("24:00"), None);
        assert_eq!(parse_fire_at("12:07:30"), None);
        assert_eq!(parse_fire_at("12:07x"), None);
        assert_eq!(parse_fire_at(" 23:59 "), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_fire_at("noon"), None);
    }

    #[test]
    fn test_should_fire_once_per_minute() {
        let fire_at = NaiveTime::from_hms_opt(2, 0, 0).unwrap();

        assert!(should_fire(at(2025, 1, 1, 2, 0, 0), fire_at, None));
        assert!(!should_fire(at(2025, 1, 1, 2, 1, 0), fire_at, None));
        assert!(!should_fire(at(2025, 1, 1, 1, 59, 59), fire_at, None));

        let fired = at(2025, 1, 1, 2, 0, 1);
        assert!(!should_fire(at(2025, 1, 1, 2, 0, 45), fire_at, Some(fired)));
        assert!(should_fire(at(2025, 1, 2, 2, 0, 3), fire_at, Some(fired)));
    }

    #[test]
    fn test_until_next_minute() {
        assert_eq!(
            until_next_minute(at(2025, 1, 1, 2, 0, 15)),
            Duration::from_secs(45)
        );
        assert_eq!(
            until_next_minute(at(2025, 1, 1, 2, 0, 0)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_cleanup_cycle_deletes_only_expired_events() {
        let pool = test_pool();
        let now = at(2025, 3, 1, 2, 0, 0);
        store(&pool, "Иванов", "Вход", now - chrono::Duration::days(200));
        store(&pool, "Иванов", "Выход", now - chrono::Duration::days(100));

        let deleted = run_cleanup_cycle(&pool, &RetentionConfig::default(), now).unwrap();

        assert_eq!(deleted, 1);
        let remaining = find_events_by_employee(&pool, "Иванов", 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            remaining[0].event_timestamp,
            now - chrono::Duration::days(100)
        );
    }
}
