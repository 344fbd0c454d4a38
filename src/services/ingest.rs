//! Inbound pipeline for controller messages: parse, deduplicate, store, then
//! fan the rendered line out to subscribers.

use chrono::{NaiveDate, NaiveDateTime};
use orion_relay::db::{DbError, DbPool};
use orion_relay::events::{parse, ParsedMessage};
use orion_relay::models::{Event, NewEvent};
use orion_relay::routing::{deliver_all, route, DeliveryError, NotificationSink};
use orion_relay::insert_event_unless_duplicate;
use serde::Serialize;

use crate::context::AppContext;
use crate::observability::alerts::Severity;
use crate::observability::metrics::Metrics;
use crate::observability::telegram_errors::handle_telegram_error;
use crate::utils::text::truncate_message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Stored,
    Duplicate,
    Unparsed,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub stored: bool,
    pub delivered: usize,
    pub failed: usize,
}

impl IngestOutcome {
    fn skipped(status: IngestStatus) -> Self {
        Self {
            status,
            stored: false,
            delivered: 0,
            failed: 0,
        }
    }
}

#[derive(Debug)]
pub struct Relayed<E> {
    pub outcome: IngestOutcome,
    pub failures: Vec<DeliveryError<E>>,
}

/// Stores the event unless the same employee already passed in the same
/// direction during that minute. `None` means it was a duplicate.
async fn store_unless_duplicate(
    pool: &DbPool,
    parsed: &ParsedMessage,
    timestamp: NaiveDateTime,
    received_at: NaiveDateTime,
) -> Result<Option<Event>, DbError> {
    let pool = pool.clone();
    let employee = parsed.employee_name.clone();
    let direction = parsed.direction.as_str();
    let raw = parsed.raw_message.clone();
    let rendered = parsed.rendered_message.clone();

    tokio::task::spawn_blocking(move || {
        insert_event_unless_duplicate(
            &pool,
            &NewEvent {
                employee_name: &employee,
                direction,
                event_timestamp: timestamp,
                raw_message: &raw,
                rendered_message: &rendered,
                created_at: received_at,
            },
        )
    })
    .await?
}

/// Runs one message through the pipeline against any sink. `now` is the
/// wall-clock time in the configured zone; its date stands in for a missing
/// date in the message.
pub async fn relay<S: NotificationSink>(
    pool: &DbPool,
    metrics: &Metrics,
    sink: &S,
    raw: &str,
    now: NaiveDateTime,
) -> Result<Relayed<S::Error>, DbError> {
    metrics.increment_events_received();

    if raw.trim().is_empty() {
        tracing::debug!("Ignoring empty message body");
        return Ok(Relayed {
            outcome: IngestOutcome::skipped(IngestStatus::Empty),
            failures: Vec::new(),
        });
    }

    let (status, subject, text) = match parse(raw) {
        Ok(parsed) => {
            let today: NaiveDate = now.date();
            let timestamp = parsed.timestamp_or(today);

            match store_unless_duplicate(pool, &parsed, timestamp, now).await? {
                Some(event) => {
                    metrics.increment_events_stored();
                    tracing::info!(
                        event_id = event.id,
                        employee = %event.employee_name,
                        direction = %event.direction,
                        timestamp = %event.event_timestamp,
                        "Event stored"
                    );
                    (
                        IngestStatus::Stored,
                        parsed.employee_name,
                        parsed.rendered_message,
                    )
                }
                None => {
                    metrics.increment_duplicates();
                    tracing::info!(
                        employee = %parsed.employee_name,
                        direction = parsed.direction.as_str(),
                        timestamp = %timestamp,
                        "Duplicate event dropped"
                    );
                    return Ok(Relayed {
                        outcome: IngestOutcome::skipped(IngestStatus::Duplicate),
                        failures: Vec::new(),
                    });
                }
            }
        }
        Err(failure) => {
            metrics.increment_unparsed();
            tracing::warn!("Message not stored: {}", failure);
            let forwarded = truncate_message(failure.forward_text(raw));
            (IngestStatus::Unparsed, forwarded.clone(), forwarded)
        }
    };

    let deliveries = {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || route(&pool, &subject, &text)).await??
    };

    let report = deliver_all(sink, &deliveries).await;
    metrics.add_messages_sent(report.delivered.len() as u64);
    metrics.add_delivery_failures(report.failures.len() as u64);

    tracing::info!(
        status = ?status,
        recipients = report.attempted(),
        delivered = report.delivered.len(),
        failed = report.failures.len(),
        "Message relayed"
    );

    Ok(Relayed {
        outcome: IngestOutcome {
            status,
            stored: status == IngestStatus::Stored,
            delivered: report.delivered.len(),
            failed: report.failures.len(),
        },
        failures: report.failures,
    })
}

/// Production entry point: relays through the bot and reports failed sends.
pub async fn ingest_message(ctx: &AppContext, raw: &str) -> Result<IngestOutcome, DbError> {
    let relayed = match relay(&ctx.pool, &ctx.metrics, &ctx.bot, raw, ctx.config.now()).await {
        Ok(relayed) => relayed,
        Err(e) => {
            tracing::error!("Failed to ingest message: {:?}", e);
            ctx.metrics.increment_errors();
            ctx.alerts
                .send_alert(
                    &ctx.bot,
                    Severity::Error,
                    "Ingest",
                    &format!("Failed to ingest message: {}", e),
                )
                .await;
            return Err(e);
        }
    };

    for failure in &relayed.failures {
        handle_telegram_error(ctx, &failure.source, failure.recipient, "relaying event").await;
    }

    Ok(relayed.outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use orion_relay::access::{add_subscriber, set_filter, Profile};
    use orion_relay::db::{create_pool, run_migrations, IN_MEMORY};
    use orion_relay::find_events_by_employee;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    const SAMPLE: &str = "Сообщение от ОРИОН\n\
        16.09.2024 5:02:17 Доступ разрешен\n\
        режим:Вход\n\
        Сотрудник:Иванов И. И.\n";

    #[derive(Default)]
    struct RecordingSink {
        failing: Vec<i64>,
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl NotificationSink for RecordingSink {
        type Error = String;

        fn send(
            &self,
            recipient: i64,
            text: &str,
        ) -> impl Future<Output = Result<(), String>> + Send {
            let result = if self.failing.contains(&recipient) {
                Err("blocked".to_string())
            } else {
                self.sent
                    .lock()
                    .unwrap()
                    .push((recipient, text.to_string()));
                Ok(())
            };
            async move { result }
        }
    }

    fn pool() -> DbPool {
        let pool = create_pool(IN_MEMORY).unwrap();
        run_migrations(&pool).unwrap();
        Arc::new(pool)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 16)
            .unwrap()
            .and_hms_opt(5, 3, 0)
            .unwrap()
    }

    fn subscribe(pool: &DbPool, user_id: i64) {
        add_subscriber(pool, Profile::bare(user_id), 900, now()).unwrap();
    }

    #[tokio::test]
    async fn test_parsed_message_is_stored_and_broadcast() {
        let pool = pool();
        let metrics = Metrics::new();
        let sink = RecordingSink::default();
        subscribe(&pool, 1);
        subscribe(&pool, 2);

        let relayed = relay(&pool, &metrics, &sink, SAMPLE, now()).await.unwrap();

        assert_eq!(relayed.outcome.status, IngestStatus::Stored);
        assert!(relayed.outcome.stored);
        assert_eq!(relayed.outcome.delivered, 2);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0].1, "🕒 5:02 | ⚙️ Вход | 👤 Иванов И. И.");

        let events = find_events_by_employee(&pool, "иванов", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw_message, SAMPLE);
        assert_eq!(metrics.snapshot().events_stored, 1);
    }

    #[tokio::test]
    async fn test_duplicate_in_same_minute_is_dropped() {
        let pool = pool();
        let metrics = Metrics::new();
        let sink = RecordingSink::default();
        subscribe(&pool, 1);

        relay(&pool, &metrics, &sink, SAMPLE, now()).await.unwrap();
        let again = SAMPLE.replace("5:02:17", "5:02:48");
        let relayed = relay(&pool, &metrics, &sink, &again, now()).await.unwrap();

        assert_eq!(relayed.outcome.status, IngestStatus::Duplicate);
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
        assert_eq!(find_events_by_employee(&pool, "Иванов", 10).unwrap().len(), 1);
        assert_eq!(metrics.snapshot().duplicate_events, 1);
    }

    #[tokio::test]
    async fn test_missing_date_uses_today() {
        let pool = pool();
        let metrics = Metrics::new();
        let sink = RecordingSink::default();

        let body = "5:02:17 режим:Выход Сотрудник:Петров П. П.";
        relay(&pool, &metrics, &sink, body, now()).await.unwrap();

        let events = find_events_by_employee(&pool, "Петров", 10).unwrap();
        assert_eq!(
            events[0].event_timestamp,
            now().date().and_hms_opt(5, 2, 17).unwrap()
        );
    }

    #[tokio::test]
    async fn test_unparsed_message_is_forwarded_not_stored() {
        let pool = pool();
        let metrics = Metrics::new();
        let sink = RecordingSink::default();
        subscribe(&pool, 1);

        let relayed = relay(&pool, &metrics, &sink, "  Тревога: вскрытие двери  ", now())
            .await
            .unwrap();

        assert_eq!(relayed.outcome.status, IngestStatus::Unparsed);
        assert!(!relayed.outcome.stored);
        assert_eq!(
            sink.sent.lock().unwrap()[0],
            (1, "Тревога: вскрытие двери".to_string())
        );
        assert_eq!(metrics.snapshot().unparsed_messages, 1);
    }

    #[tokio::test]
    async fn test_filters_and_failures() {
        let pool = pool();
        let metrics = Metrics::new();
        let sink = RecordingSink {
            failing: vec![3],
            ..Default::default()
        };
        subscribe(&pool, 1);
        subscribe(&pool, 2);
        subscribe(&pool, 3);
        set_filter(&pool, 2, "петров", now()).unwrap();

        let relayed = relay(&pool, &metrics, &sink, SAMPLE, now()).await.unwrap();

        assert_eq!(relayed.outcome.delivered, 1);
        assert_eq!(relayed.outcome.failed, 1);
        assert_eq!(relayed.failures[0].recipient, 3);
        assert_eq!(sink.sent.lock().unwrap()[0].0, 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_sent, 1);
        assert_eq!(snapshot.delivery_failures, 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_ignored() {
        let pool = pool();
        let metrics = Metrics::new();
        let sink = RecordingSink::default();
        subscribe(&pool, 1);

        let relayed = relay(&pool, &metrics, &sink, " \n ", now()).await.unwrap();

        assert_eq!(relayed.outcome.status, IngestStatus::Empty);
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
