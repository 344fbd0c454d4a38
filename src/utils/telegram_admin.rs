use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::{Bot, RequestError};

use crate::context::AppContext;

/// Operational log line for administrators, gated by `ADMIN_LOGS` and
/// `ADMIN_LOG_LEVEL`. Lower `level` is more important.
pub async fn send_message_to_admin(
    ctx: &AppContext,
    message: String,
    level: u8,
) -> Result<(), RequestError> {
    if !ctx.config.admin_logs || level > ctx.config.admin_log_level {
        return Ok(());
    }

    for admin_id in &ctx.config.admin_ids {
        ctx.bot
            .send_message(ChatId(*admin_id), message.clone())
            .await?;
    }

    Ok(())
}

/// Sends `text` to every administrator. One failing admin does not stop the
/// others; returns how many were reached.
pub async fn notify_admins(
    bot: &Bot,
    admin_ids: &[i64],
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> usize {
    let mut reached = 0;

    for admin_id in admin_ids {
        let mut request = bot.send_message(ChatId(*admin_id), text);
        if let Some(keyboard) = &keyboard {
            request = request.reply_markup(keyboard.clone());
        }

        match request.await {
            Ok(_) => {
                tracing::info!(admin_id, "Admin notified");
                reached += 1;
            }
            Err(e) => {
                tracing::error!(admin_id, "Failed to notify admin: {}", e);
            }
        }
    }

    reached
}
