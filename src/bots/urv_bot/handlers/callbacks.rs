use orion_relay::i18n::{t, t_with_args, DEFAULT_LANGUAGE};
use orion_relay::report::PERIOD_CHOICES;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use super::super::keyboards::{parse_callback, CallbackAction};
use super::super::utils::language_of;
use super::admin::apply_decision;
use super::{is_subscriber, reply_db_error};
use crate::context::AppContext;
use crate::services::reports::{build_report, send_report_document, ReportOutcome};

pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: AppContext) -> ResponseResult<()> {
    let data = match &q.data {
        Some(d) => d.clone(),
        None => return Ok(()),
    };

    let user_id = q.from.id.0 as i64;
    let language = language_of(Some(&q.from));

    match parse_callback(&data) {
        Some(CallbackAction::Approve(request_id)) => {
            handle_auth_callback(&ctx, &bot, &q, user_id, language, request_id, true).await?
        }
        Some(CallbackAction::Reject(request_id)) => {
            handle_auth_callback(&ctx, &bot, &q, user_id, language, request_id, false).await?
        }
        Some(CallbackAction::Report { days, pattern }) => {
            handle_report_callback(&ctx, &bot, &q, user_id, language, days, &pattern).await?
        }
        None => {
            tracing::warn!(user_id, data = %data, "Unknown callback data");
            bot.answer_callback_query(&q.id)
                .text(t(language, "common.bad_callback"))
                .await?;
        }
    }

    Ok(())
}

async fn handle_auth_callback(
    ctx: &AppContext,
    bot: &Bot,
    q: &CallbackQuery,
    user_id: i64,
    language: &str,
    request_id: i32,
    approved: bool,
) -> ResponseResult<()> {
    if !ctx.config.is_admin(user_id) {
        tracing::warn!(user_id, request_id, "Auth decision refused");
        bot.answer_callback_query(&q.id)
            .text(t(language, "common.unauthorized_action"))
            .await?;
        return Ok(());
    }

    let text = match apply_decision(ctx, request_id, approved, user_id, language).await {
        Ok(text) => text,
        Err(e) => {
            bot.answer_callback_query(&q.id).await?;
            let chat_id = q
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(ChatId(user_id));
            return reply_db_error(ctx, bot, chat_id, language, "decide auth request", e).await;
        }
    };

    bot.answer_callback_query(&q.id).text(text.clone()).await?;

    if let Some(msg) = &q.message {
        if let Err(e) = bot.edit_message_text(msg.chat.id, msg.id, &text).await {
            tracing::warn!("Failed to update auth request message: {}", e);
        }
    }

    Ok(())
}

async fn handle_report_callback(
    ctx: &AppContext,
    bot: &Bot,
    q: &CallbackQuery,
    user_id: i64,
    language: &str,
    days: i64,
    pattern: &str,
) -> ResponseResult<()> {
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat.id)
        .unwrap_or(ChatId(user_id));

    match is_subscriber(ctx, user_id) {
        Ok(true) => {}
        Ok(false) => {
            bot.answer_callback_query(&q.id)
                .text(t(language, "common.not_subscribed"))
                .await?;
            return Ok(());
        }
        Err(e) => {
            bot.answer_callback_query(&q.id).await?;
            return reply_db_error(ctx, bot, chat_id, language, "check subscriber", e).await;
        }
    }

    if !PERIOD_CHOICES.contains(&days) {
        bot.answer_callback_query(&q.id)
            .text(t(language, "report.bad_period"))
            .await?;
        return Ok(());
    }

    bot.answer_callback_query(&q.id)
        .text(t(language, "report.generating"))
        .await?;

    let pool = ctx.pool.clone();
    let owned_pattern = pattern.to_string();
    let now = ctx.config.now();
    let built =
        tokio::task::spawn_blocking(move || build_report(&pool, &owned_pattern, days, now)).await;

    let outcome = match built {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            tracing::error!("Failed to build report: {:?}", e);
            ctx.metrics.increment_errors();
            bot.send_message(chat_id, t(language, "report.error"))
                .await?;
            return Ok(());
        }
        Err(e) => {
            tracing::error!("Report task panicked: {:?}", e);
            ctx.metrics.increment_errors();
            bot.send_message(chat_id, t(language, "report.error"))
                .await?;
            return Ok(());
        }
    };

    match outcome {
        ReportOutcome::EmployeeNotFound => {
            bot.send_message(
                chat_id,
                t_with_args(language, "report.employee_not_found", &[pattern]),
            )
            .await?;
        }
        ReportOutcome::NoEvents { employee } => {
            bot.send_message(
                chat_id,
                t_with_args(language, "report.no_events", &[employee.as_str()]),
            )
            .await?;
        }
        ReportOutcome::Ready { employee, document } => {
            tracing::info!(user_id, employee = %employee, days, "Sending report");
            let caption = t_with_args(DEFAULT_LANGUAGE, "report.caption", &[employee.as_str()]);
            if let Err(e) = send_report_document(ctx, chat_id, document, caption).await {
                tracing::error!("Failed to send report: {:?}", e);
                ctx.metrics.increment_errors();
                bot.send_message(chat_id, t(language, "report.error"))
                    .await?;
            }
        }
    }

    Ok(())
}
