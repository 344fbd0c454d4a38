use chrono::NaiveDateTime;
use orion_relay::db::{DbError, SqlitePool};
use orion_relay::report::{render, ReportDocument};
use orion_relay::shifts::reconstruct_events;
use orion_relay::{find_events_by_employee_and_period, find_full_employee_name};
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::context::AppContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    EmployeeNotFound,
    NoEvents { employee: String },
    Ready {
        employee: String,
        document: ReportDocument,
    },
}

/// Resolves the employee, loads the period and renders the document. `now` is
/// the wall-clock time in the configured zone.
pub fn build_report(
    pool: &SqlitePool,
    pattern: &str,
    period_days: i64,
    now: NaiveDateTime,
) -> Result<ReportOutcome, DbError> {
    let Some(employee) = find_full_employee_name(pool, pattern)? else {
        return Ok(ReportOutcome::EmployeeNotFound);
    };

    let events = find_events_by_employee_and_period(pool, &employee, period_days, now)?;
    if events.is_empty() {
        return Ok(ReportOutcome::NoEvents { employee });
    }

    let summary = reconstruct_events(&events, now.date());
    tracing::info!(
        employee = %employee,
        period_days,
        events = events.len(),
        days = summary.days.len(),
        "Report built"
    );

    let latest_event = events.iter().map(|e| e.event_timestamp.date()).max();
    let document = render(&summary, &employee, period_days, latest_event, now);
    Ok(ReportOutcome::Ready { employee, document })
}

pub async fn send_report_document(
    ctx: &AppContext,
    chat_id: ChatId,
    document: ReportDocument,
    caption: String,
) -> ResponseResult<()> {
    let ReportDocument { file_name, content } = document;

    ctx.bot
        .send_document(
            chat_id,
            InputFile::memory(content.into_bytes()).file_name(file_name),
        )
        .caption(caption)
        .await?;

    ctx.metrics.increment_messages_sent();
    Ok(())
}
