use html_escape::encode_text;
use orion_relay::config::AppConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use teloxide::prelude::*;
use teloxide::types::ParseMode;

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (marker, name) = match self {
            Severity::Error => ("❌", "ERROR"),
            Severity::Warning => ("⚠️", "WARNING"),
            Severity::Info => ("ℹ️", "INFO"),
        };
        write!(f, "{} <b>[{}]</b>", marker, name)
    }
}

/// Operational alerts for administrators, sent only when `ADMIN_LOGS=ACTIVE`.
/// Each severity and category pair is sent at most once per cooldown.
pub struct AlertManager {
    enabled: bool,
    recipients: Vec<i64>,
    cooldown: Duration,
    recent: Mutex<HashMap<(Severity, String), Instant>>,
}

impl AlertManager {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.admin_logs, config.admin_ids.clone(), DEFAULT_COOLDOWN)
    }

    pub fn new(enabled: bool, recipients: Vec<i64>, cooldown: Duration) -> Self {
        Self {
            enabled,
            recipients,
            cooldown,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Records the alert and returns `true` unless the same pair was admitted
    /// within the cooldown before `now`.
    pub fn admit(&self, severity: Severity, category: &str, now: Instant) -> bool {
        let mut recent = self
            .recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        recent.retain(|_, sent_at| now.duration_since(*sent_at) < self.cooldown);

        let key = (severity, category.to_string());
        if recent.contains_key(&key) {
            return false;
        }
        recent.insert(key, now);
        true
    }

    pub fn render(severity: Severity, category: &str, message: &str) -> String {
        format!("{} {}\n{}", severity, category, encode_text(message))
    }

    pub async fn send_alert(&self, bot: &Bot, severity: Severity, category: &str, message: &str) {
        if !self.enabled {
            return;
        }
        if !self.admit(severity, category, Instant::now()) {
            tracing::debug!(category, "Alert suppressed: {}", message);
            return;
        }

        let text = Self::render(severity, category, message);
        for admin_id in &self.recipients {
            if let Err(e) = bot
                .send_message(ChatId(*admin_id), &text)
                .parse_mode(ParseMode::Html)
                .await
            {
                tracing::error!(admin_id, "Failed to send alert: {}", e);
            }
        }
    }
}
