use orion_relay::i18n::{t, t_with_args, DEFAULT_LANGUAGE};
use orion_relay::{
    clear_filter, create_auth_request, find_full_employee_name,
    find_pending_auth_request_for_user, is_authorized, set_filter,
};
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::types::User;

use super::super::keyboards::{build_auth_keyboard, build_report_keyboard};
use super::super::utils::{format_auth_notice, language_of, non_empty, profile_of};
use super::admin::{
    handle_add_user, handle_decision_command, handle_list_users, handle_pending,
    handle_remove_user, handle_stats,
};
use super::{is_subscriber, reply_db_error};
use crate::context::AppContext;
use crate::utils::telegram_admin::notify_admins;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "перезапуск бота")]
    Start,
    #[command(description = "справка")]
    Help,
    #[command(description = "запросить авторизацию")]
    Auth,
    #[command(description = "фильтр по фамилии сотрудника")]
    Filter(String),
    #[command(description = "отключить фильтр")]
    Unfilter,
    #[command(description = "отчет УРВ по сотруднику")]
    Report(String),
    #[command(description = "одобрить заявку")]
    Approve(String),
    #[command(description = "отклонить заявку")]
    Reject(String),
    #[command(description = "заявки на рассмотрении")]
    Pending,
    #[command(description = "список пользователей")]
    Listusers,
    #[command(description = "добавить пользователя")]
    Adduser(String),
    #[command(description = "удалить пользователя")]
    Removeuser(String),
    #[command(description = "статистика")]
    Stats,
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    command: Command,
    ctx: AppContext,
) -> ResponseResult<()> {
    let user = match msg.from() {
        Some(u) => u,
        None => return Ok(()),
    };

    let user_id = user.id.0 as i64;
    let language = language_of(Some(user));

    match command {
        Command::Start => handle_start(&ctx, &bot, &msg, user_id, language).await?,
        Command::Help => handle_help(&ctx, &bot, &msg, user_id, language).await?,
        Command::Auth => handle_auth(&ctx, &bot, &msg, user, language).await?,
        Command::Filter(pattern) => {
            handle_filter(&ctx, &bot, &msg, user_id, language, &pattern).await?
        }
        Command::Unfilter => handle_unfilter(&ctx, &bot, &msg, user_id, language).await?,
        Command::Report(pattern) => {
            handle_report(&ctx, &bot, &msg, user_id, language, &pattern).await?
        }
        Command::Approve(arg) => {
            handle_decision_command(&ctx, &bot, &msg, user_id, language, &arg, true).await?
        }
        Command::Reject(arg) => {
            handle_decision_command(&ctx, &bot, &msg, user_id, language, &arg, false).await?
        }
        Command::Pending => handle_pending(&ctx, &bot, &msg, user_id, language).await?,
        Command::Listusers => handle_list_users(&ctx, &bot, &msg, user_id, language).await?,
        Command::Adduser(arg) => {
            handle_add_user(&ctx, &bot, &msg, user_id, language, &arg).await?
        }
        Command::Removeuser(arg) => {
            handle_remove_user(&ctx, &bot, &msg, user_id, language, &arg).await?
        }
        Command::Stats => handle_stats(&ctx, &bot, &msg, user_id, language).await?,
    };

    Ok(())
}

/// Replies with a refusal and returns `false` unless the sender may use
/// subscriber commands.
async fn require_subscriber(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<bool> {
    match is_subscriber(ctx, user_id) {
        Ok(true) => Ok(true),
        Ok(false) => {
            bot.send_message(msg.chat.id, t(language, "common.not_subscribed"))
                .await?;
            Ok(false)
        }
        Err(e) => {
            reply_db_error(ctx, bot, msg.chat.id, language, "check subscriber", e).await?;
            Ok(false)
        }
    }
}

async fn handle_start(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    let known = match is_subscriber(ctx, user_id) {
        Ok(known) => known,
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "check subscriber", e).await
        }
    };

    let key = if known { "start.restarted" } else { "start.welcome" };
    bot.send_message(msg.chat.id, t(language, key)).await?;

    tracing::info!(user_id, known, "Start command");
    Ok(())
}

async fn handle_help(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    let mut text = t(language, "help.text");
    if ctx.config.is_admin(user_id) {
        text.push_str(&t(language, "help.admin_text"));
    }

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_auth(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user: &User,
    language: &str,
) -> ResponseResult<()> {
    let user_id = user.id.0 as i64;

    match is_authorized(&ctx.pool, user_id) {
        Ok(true) => {
            bot.send_message(msg.chat.id, t(language, "auth.already_authorized"))
                .await?;
            return Ok(());
        }
        Ok(false) => {}
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "check subscriber", e).await
        }
    }

    match find_pending_auth_request_for_user(&ctx.pool, user_id) {
        Ok(Some(request)) => {
            tracing::info!(user_id, request_id = request.id, "Auth request already pending");
            bot.send_message(msg.chat.id, t(language, "auth.already_pending"))
                .await?;
            return Ok(());
        }
        Ok(None) => {}
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "look up auth request", e)
                .await
        }
    }

    let now = ctx.config.now();
    let request = match create_auth_request(&ctx.pool, profile_of(user), now) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("Failed to create auth request: {:?}", e);
            ctx.metrics.increment_errors();
            bot.send_message(msg.chat.id, t(language, "auth.error"))
                .await?;
            return Ok(());
        }
    };

    ctx.metrics.increment_auth_requests();
    tracing::info!(user_id, request_id = request.id, "Auth request created");

    let notice = format_auth_notice(DEFAULT_LANGUAGE, &request, now);
    let keyboard = build_auth_keyboard(DEFAULT_LANGUAGE, request.id);
    let reached = notify_admins(bot, &ctx.config.admin_ids, &notice, Some(keyboard)).await;
    if reached == 0 {
        tracing::warn!(request_id = request.id, "No administrator received the auth request");
    }

    bot.send_message(msg.chat.id, t(language, "auth.queued"))
        .await?;
    Ok(())
}

async fn handle_filter(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
    pattern: &str,
) -> ResponseResult<()> {
    if !require_subscriber(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let Some(pattern) = non_empty(pattern) else {
        bot.send_message(msg.chat.id, t(language, "filter.usage"))
            .await?;
        return Ok(());
    };

    if let Err(e) = set_filter(&ctx.pool, user_id, pattern, ctx.config.now()) {
        return reply_db_error(ctx, bot, msg.chat.id, language, "set filter", e).await;
    }

    tracing::info!(user_id, filter = pattern, "Filter set");
    bot.send_message(msg.chat.id, t_with_args(language, "filter.set", &[pattern]))
        .await?;
    Ok(())
}

async fn handle_unfilter(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    if !require_subscriber(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let key = match clear_filter(&ctx.pool, user_id) {
        Ok(true) => "filter.cleared",
        Ok(false) => "filter.none",
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "clear filter", e).await
        }
    };

    bot.send_message(msg.chat.id, t(language, key)).await?;
    Ok(())
}

async fn handle_report(
    ctx: &AppContext,
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    language: &str,
    pattern: &str,
) -> ResponseResult<()> {
    if !require_subscriber(ctx, bot, msg, user_id, language).await? {
        return Ok(());
    }

    let Some(pattern) = non_empty(pattern) else {
        bot.send_message(msg.chat.id, t(language, "report.usage"))
            .await?;
        return Ok(());
    };

    let employee = match find_full_employee_name(&ctx.pool, pattern) {
        Ok(Some(employee)) => employee,
        Ok(None) => {
            bot.send_message(
                msg.chat.id,
                t_with_args(language, "report.employee_not_found", &[pattern]),
            )
            .await?;
            return Ok(());
        }
        Err(e) => {
            return reply_db_error(ctx, bot, msg.chat.id, language, "find employee", e).await
        }
    };

    bot.send_message(
        msg.chat.id,
        t_with_args(language, "report.choose_period", &[employee.as_str()]),
    )
    .reply_markup(build_report_keyboard(&employee))
    .await?;
    Ok(())
}
