use orion_relay::access::{DecisionOutcome, Profile};
use orion_relay::db::DbError;
use orion_relay::i18n::{t, t_with_args, DEFAULT_LANGUAGE};
use orion_relay::{
    add_subscriber, decide_auth_request, get_event_statistics, list_pending_auth_requests,
    list_subscribers, remove_subscriber,
};
use teloxide::prelude::*;

use super::super::utils::{non_empty, parse_user_id_argument, UserIdArgument};
use super::reply_db_error;
use crate::context::AppContext;
use crate::observability::telegram_errors::handle_telegram_error;
use crate::utils::text::truncate_message;

/// Replies with a refusal and returns `false` for non-administrators.
async fn require_admin(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<bool> {
    if ctx.config.is_admin(user_id) {
        return Ok(true);
    }

    tracing::warn!(user_id, "Admin command refused");
    bot.send_message(msg.chat.id, t(language, "common.unauthorized"))
        .await?;
    Ok(false)
}

/// Applies an administrator's decision and tells the requester. Returns the
/// text to show the administrator.
pub(super) async fn apply_decision(
    ctx: &AppContext,
    request_id: i32,
    approved: bool,
    admin_id: i64,
    language: &str,
) -> Result<String, DbError> {
    let outcome = decide_auth_request(&ctx.pool, request_id, approved, admin_id, ctx.config.now())?;
    let id = request_id.to_string();

    let text = match outcome {
        DecisionOutcome::Approved(request) | DecisionOutcome::Rejected(request) => {
            let (user_key, admin_key) = if approved {
                ("auth.approved_user", "auth.approved_admin")
            } else {
                ("auth.rejected_user", "auth.rejected_admin")
            };

            let chat_id = ChatId(request.user_id);
            if let Err(e) = ctx
                .bot
                .send_message(chat_id, t(DEFAULT_LANGUAGE, user_key))
                .await
            {
                handle_telegram_error(ctx, &e, chat_id.0, "notifying requester").await;
            }

            t_with_args(language, admin_key, &[id.as_str(), &request.display_name()])
        }
        DecisionOutcome::AlreadyProcessed(request) => {
            let status = t(language, &format!("auth.status.{}", request.status));
            t_with_args(language, "auth.already_processed", &[id.as_str(), &status])
        }
        DecisionOutcome::NotFound => t_with_args(language, "auth.not_found", &[id.as_str()]),
    };

    Ok(text)
}

pub(super) async fn handle_decision_command(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
    argument: &str,
    approved: bool,
) -> ResponseResult<()> {
    if !require_admin(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let command = if approved { "approve" } else { "reject" };
    let Some(argument) = non_empty(argument) else {
        bot.send_message(
            msg.chat.id,
            t_with_args(language, "admin.request_usage", &[command]),
        )
        .await?;
        return Ok(());
    };

    let Ok(request_id) = argument.parse::<i32>() else {
        bot.send_message(msg.chat.id, t(language, "admin.request_format"))
            .await?;
        return Ok(());
    };

    match apply_decision(ctx, request_id, approved, user_id, language).await {
        Ok(text) => {
            bot.send_message(msg.chat.id, text).await?;
            Ok(())
        }
        Err(e) => reply_db_error(ctx, bot, msg.chat.id, language, "decide auth request", e).await,
    }
}

pub(super) async fn handle_pending(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    if !require_admin(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let requests = match list_pending_auth_requests(&ctx.pool) {
        Ok(requests) => requests,
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "list auth requests", e).await
        }
    };

    if requests.is_empty() {
        bot.send_message(msg.chat.id, t(language, "auth.pending_empty"))
            .await?;
        return Ok(());
    }

    let mut lines = vec![t(language, "auth.pending_header"), String::new()];
    for request in &requests {
        lines.push(format!(
            "#{} • {} • {}",
            request.id,
            request.display_name(),
            request.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    lines.push(String::new());
    lines.push(t(language, "admin.pending_hint"));

    bot.send_message(msg.chat.id, truncate_message(&lines.join("\n")))
        .await?;
    Ok(())
}

pub(super) async fn handle_list_users(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    if !require_admin(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let subscribers = match list_subscribers(&ctx.pool) {
        Ok(subscribers) => subscribers,
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "list subscribers", e).await
        }
    };

    if subscribers.is_empty() {
        bot.send_message(msg.chat.id, t(language, "admin.users_empty"))
            .await?;
        return Ok(());
    }

    let mut lines = vec![t(language, "admin.users_header"), String::new()];
    lines.extend(
        subscribers
            .iter()
            .map(|s| format!("• {}: {}", s.user_id, s.display_name())),
    );

    bot.send_message(msg.chat.id, truncate_message(&lines.join("\n")))
        .await?;
    Ok(())
}

/// Parses the user id argument, replying with usage or format help when it
/// is unusable.
async fn user_id_argument(
    bot: &Bot,
    msg: &Message,
    language: &str,
    command: &str,
    argument: &str,
) -> ResponseResult<Option<i64>> {
    match parse_user_id_argument(argument) {
        UserIdArgument::Valid(id) => Ok(Some(id)),
        UserIdArgument::Missing => {
            bot.send_message(
                msg.chat.id,
                t_with_args(language, "admin.id_usage", &[command]),
            )
            .await?;
            Ok(None)
        }
        UserIdArgument::Invalid => {
            bot.send_message(msg.chat.id, t(language, "admin.id_format"))
                .await?;
            Ok(None)
        }
    }
}

pub(super) async fn handle_add_user(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
    argument: &str,
) -> ResponseResult<()> {
    if !require_admin(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let Some(target) = user_id_argument(bot, msg, language, "adduser", argument).await? else {
        return Ok(());
    };

    let key = match add_subscriber(&ctx.pool, Profile::bare(target), user_id, ctx.config.now()) {
        Ok(true) => {
            tracing::info!(user_id = target, added_by = user_id, "Subscriber added");
            "admin.user_added"
        }
        Ok(false) => "admin.user_exists",
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "add subscriber", e).await
        }
    };

    bot.send_message(
        msg.chat.id,
        t_with_args(language, key, &[target.to_string().as_str()]),
    )
    .await?;
    Ok(())
}

pub(super) async fn handle_remove_user(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
    argument: &str,
) -> ResponseResult<()> {
    if !require_admin(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let Some(target) = user_id_argument(bot, msg, language, "removeuser", argument).await? else {
        return Ok(());
    };

    let key = match remove_subscriber(&ctx.pool, target) {
        Ok(true) => {
            tracing::info!(user_id = target, removed_by = user_id, "Subscriber removed");
            "admin.user_removed"
        }
        Ok(false) => "admin.user_missing",
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "remove subscriber", e).await
        }
    };

    bot.send_message(
        msg.chat.id,
        t_with_args(language, key, &[target.to_string().as_str()]),
    )
    .await?;
    Ok(())
}

pub(super) async fn handle_stats(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    if !require_admin(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let stats = match get_event_statistics(&ctx.pool) {
        Ok(stats) => stats,
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "load statistics", e).await
        }
    };
    let snapshot = ctx.metrics.snapshot();

    let last_event = stats
        .last_event
        .as_ref()
        .map(|e| {
            format!(
                "{} {} {}",
                e.event_timestamp.format("%Y-%m-%d %H:%M:%S"),
                e.direction,
                e.employee_name
            )
        })
        .unwrap_or_else(|| t(language, "admin.no_events"));

    let mut text = t_with_args(
        language,
        "admin.stats",
        &[
            &stats.total_events.to_string(),
            &stats.unique_employees.to_string(),
            &last_event,
            &snapshot.events_received.to_string(),
            &snapshot.events_stored.to_string(),
            &snapshot.duplicate_events.to_string(),
            &snapshot.unparsed_messages.to_string(),
            &snapshot.messages_sent.to_string(),
            &snapshot.delivery_failures.to_string(),
            &snapshot.events_deleted.to_string(),
        ],
    );

    if !stats.per_direction.is_empty() {
        text.push('\n');
        for (direction, count) in &stats.per_direction {
            text.push('\n');
            text.push_str(&t_with_args(
                language,
                "admin.stats_direction",
                &[direction.as_str(), &count.to_string()],
            ));
        }
    }

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
