use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::env;
use std::time::Duration;

use crate::retention::RetentionConfig;
use crate::shutdown::DEFAULT_CONFIRM_WINDOW;

pub const DEFAULT_DATABASE_URL: &str = "db/urv.db";
pub const DEFAULT_INGEST_HOST: &str = "127.0.0.1";
pub const DEFAULT_INGEST_PORT: u16 = 8025;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub admin_ids: Vec<i64>,
    pub database_url: String,
    pub ingest_host: String,
    pub ingest_port: u16,
    pub retention: RetentionConfig,
    pub timezone: Option<Tz>,
    pub exit_confirm_window: Duration,
    pub admin_logs: bool,
    pub admin_log_level: u8,
}

#[derive(Debug)]
pub struct ConfigError {
    pub missing_vars: Vec<String>,
    pub invalid_vars: Vec<(String, String)>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing_vars.is_empty() {
            writeln!(f, "Missing required environment variables:")?;
            for var in &self.missing_vars {
                writeln!(f, "  - {}", var)?;
            }
        }
        if !self.invalid_vars.is_empty() {
            writeln!(f, "Invalid environment variables:")?;
            for (var, err) in &self.invalid_vars {
                writeln!(f, "  - {}: {}", var, err)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

fn get_required<F>(lookup: &F, name: &str, missing: &mut Vec<String>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            missing.push(name.to_string());
            None
        }
    }
}

pub fn parse_admin_ids(value: &str) -> Result<Vec<i64>, String> {
    let mut ids = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|e| format!("'{}' is not a numeric user id: {}", part, e))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err("at least one administrator id is required".to_string());
    }
    Ok(ids)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let telegram_token = get_required(&lookup, "TELEGRAM_BOT_TOKEN", &mut missing);
        let admin_ids_str = get_required(&lookup, "ADMIN_IDS", &mut missing);

        let admin_ids = admin_ids_str
            .as_deref()
            .and_then(|s| {
                parse_admin_ids(s)
                    .map_err(|e| invalid.push(("ADMIN_IDS".into(), e)))
                    .ok()
            })
            .unwrap_or_default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let ingest_host = lookup("INGEST_HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INGEST_HOST.to_string());

        let ingest_port = lookup("INGEST_PORT")
            .unwrap_or_else(|| DEFAULT_INGEST_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| {
                invalid.push(("INGEST_PORT".into(), e.to_string()));
            })
            .unwrap_or(DEFAULT_INGEST_PORT);

        let timezone = match lookup("APP_TIMEZONE").filter(|v| !v.trim().is_empty()) {
            None => None,
            Some(name) => match name.trim().parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(e) => {
                    invalid.push(("APP_TIMEZONE".into(), e.to_string()));
                    None
                }
            },
        };

        let retention = RetentionConfig::from_values(
            lookup("EVENTS_CLEANUP_ENABLED").as_deref(),
            lookup("EVENTS_RETENTION_DAYS").as_deref(),
            lookup("EVENTS_CLEANUP_TIME").as_deref(),
        );

        let exit_confirm_window = lookup("EXIT_CONFIRM_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONFIRM_WINDOW);

        let admin_logs = lookup("ADMIN_LOGS").unwrap_or_default() == "ACTIVE";

        let admin_log_level = lookup("ADMIN_LOG_LEVEL")
            .unwrap_or_else(|| "50".into())
            .parse::<u8>()
            .unwrap_or(50);

        let (Some(telegram_token), true, true) =
            (telegram_token, missing.is_empty(), invalid.is_empty())
        else {
            return Err(ConfigError {
                missing_vars: missing,
                invalid_vars: invalid,
            });
        };

        Ok(Self {
            telegram_token,
            admin_ids,
            database_url,
            ingest_host,
            ingest_port,
            retention,
            timezone,
            exit_confirm_window,
            admin_logs,
            admin_log_level,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Wall-clock time in the configured zone, or the host's local zone.
    pub fn now(&self) -> NaiveDateTime {
        local_now(self.timezone)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub fn local_now(timezone: Option<Tz>) -> NaiveDateTime {
    match timezone {
        Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
        None => Local::now().naive_local(),
    }
}
