mod admin;
mod callbacks;
mod commands;

pub use callbacks::callback_handler;
pub use commands::{command_handler, Command};

use orion_relay::db::DbError;
use orion_relay::i18n::t;
use orion_relay::is_authorized;
use teloxide::prelude::*;

use crate::context::AppContext;
use crate::observability::alerts::Severity;

/// Subscribers and administrators may use the subscriber commands.
pub(crate) fn is_subscriber(ctx: &AppContext, user_id: i64) -> Result<bool, DbError> {
    if ctx.config.is_admin(user_id) {
        return Ok(true);
    }
    is_authorized(&ctx.pool, user_id)
}

/// Logs a store failure, raises an alert and tells the user something went
/// wrong.
pub(crate) async fn reply_db_error(
    ctx: &AppContext,
    bot: &Bot,
    chat_id: ChatId,
    language: &str,
    action: &str,
    error: DbError,
) -> ResponseResult<()> {
    tracing::error!("Failed to {}: {:?}", action, error);
    ctx.metrics.increment_errors();
    ctx.alerts
        .send_alert(
            bot,
            Severity::Error,
            "Database",
            &format!("Failed to {}: {}", action, error),
        )
        .await;

    bot.send_message(chat_id, t(language, "common.error"))
        .await?;
    Ok(())
}

/// Logs plain messages that are not commands.
pub async fn message_handler(msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        tracing::debug!(
            chat_id = msg.chat.id.0,
            user_id = msg.from().map(|u| u.id.0),
            "Ignoring non-command message: {}",
            text
        );
    }
    Ok(())
}
