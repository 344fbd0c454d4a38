use teloxide::RequestError;

use super::alerts::Severity;
use crate::context::AppContext;

/// Coarse reason a Telegram send failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    RateLimited { retry_after_secs: u64 },
    Blocked,
    ChatNotFound,
    Network,
    Other,
}

impl SendFailure {
    pub fn classify(error: &RequestError) -> Self {
        match error {
            RequestError::RetryAfter(wait) => SendFailure::RateLimited {
                retry_after_secs: wait.as_secs(),
            },
            RequestError::Api(api_error) => {
                let text = api_error.to_string().to_lowercase();
                if text.contains("blocked") || text.contains("deactivated") {
                    SendFailure::Blocked
                } else if text.contains("chat not found") || text.contains("user not found") {
                    SendFailure::ChatNotFound
                } else {
                    SendFailure::Other
                }
            }
            RequestError::Network(_) | RequestError::Io(_) => SendFailure::Network,
            _ => SendFailure::Other,
        }
    }

    /// Alert severity and category for this kind of failure. A subscriber who
    /// blocked the bot is routine.
    fn alert(self) -> (Severity, &'static str) {
        match self {
            SendFailure::RateLimited { .. } => (Severity::Warning, "Telegram rate limit"),
            SendFailure::Blocked => (Severity::Info, "Telegram blocked"),
            SendFailure::ChatNotFound => (Severity::Warning, "Telegram chat missing"),
            SendFailure::Network => (Severity::Error, "Telegram network"),
            SendFailure::Other => (Severity::Warning, "Telegram"),
        }
    }
}

/// Logs a failed send, counts it and raises an admin alert.
pub async fn handle_telegram_error(
    ctx: &AppContext,
    error: &RequestError,
    chat_id: i64,
    context: &str,
) {
    ctx.metrics.increment_errors();

    let failure = SendFailure::classify(error);
    match failure {
        SendFailure::RateLimited { retry_after_secs } => {
            tracing::warn!(chat_id, retry_after_secs, "Telegram rate limit while {}", context)
        }
        SendFailure::Blocked => tracing::info!(chat_id, "Bot blocked while {}", context),
        SendFailure::ChatNotFound => tracing::warn!(chat_id, "Chat not found while {}", context),
        SendFailure::Network | SendFailure::Other => {
            tracing::error!(chat_id, "Failed {}: {}", context, error)
        }
    }

    let (severity, category) = failure.alert();
    ctx.alerts
        .send_alert(
            &ctx.bot,
            severity,
            category,
            &format!("chat {} while {}: {}", chat_id, context, error),
        )
        .await;
}
