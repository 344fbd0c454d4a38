use std::future::Future;
use teloxide::prelude::*;
use teloxide::RequestError;

use crate::access::{filter_allows, subscribers_with_filters};
use crate::db::{DbError, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subscriber_id: i64,
    pub text: String,
}

/// Outbound side of the relay: best-effort delivery of one text to one
/// recipient.
pub trait NotificationSink {
    type Error: std::fmt::Display;

    fn send(&self, recipient: i64, text: &str)
        -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl NotificationSink for Bot {
    type Error = RequestError;

    fn send(
        &self,
        recipient: i64,
        text: &str,
    ) -> impl Future<Output = Result<(), RequestError>> + Send {
        let request = self.send_message(ChatId(recipient), text.to_owned());
        async move { request.await.map(|_| ()) }
    }
}

#[derive(Debug)]
pub struct DeliveryError<E> {
    pub recipient: i64,
    pub source: E,
}

impl<E: std::fmt::Display> std::fmt::Display for DeliveryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Delivery to {} failed: {}", self.recipient, self.source)
    }
}

#[derive(Debug)]
pub struct DeliveryReport<E> {
    pub delivered: Vec<i64>,
    pub failures: Vec<DeliveryError<E>>,
}

impl<E> DeliveryReport<E> {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }
}

/// Pairs every subscriber whose filter admits `subject` with `text`.
///
/// `subject` is what filters are matched against: the employee name for a
/// parsed event, the forwarded text otherwise.
pub fn route(pool: &SqlitePool, subject: &str, text: &str) -> Result<Vec<Delivery>, DbError> {
    let deliveries: Vec<Delivery> = subscribers_with_filters(pool)?
        .into_iter()
        .filter(|(subscriber_id, filter)| {
            let allowed = filter_allows(filter.as_deref(), subject);
            if !allowed {
                tracing::debug!(subscriber_id, "Event filtered out for subscriber");
            }
            allowed
        })
        .map(|(subscriber_id, _)| Delivery {
            subscriber_id,
            text: text.to_string(),
        })
        .collect();

    Ok(deliveries)
}

/// Sends each delivery in turn. A failed send is recorded and the loop moves
/// on to the next recipient.
pub async fn deliver_all<S: NotificationSink>(
    sink: &S,
    deliveries: &[Delivery],
) -> DeliveryReport<S::Error> {
    let mut report = DeliveryReport {
        delivered: Vec::with_capacity(deliveries.len()),
        failures: Vec::new(),
    };

    for delivery in deliveries {
        match sink.send(delivery.subscriber_id, &delivery.text).await {
            Ok(()) => {
                tracing::debug!(recipient = delivery.subscriber_id, "Message delivered");
                report.delivered.push(delivery.subscriber_id);
            }
            Err(e) => {
                tracing::warn!(
                    recipient = delivery.subscriber_id,
                    "Failed to deliver message: {}",
                    e
                );
                report.failures.push(DeliveryError {
                    recipient: delivery.subscriber_id,
                    source: e,
                });
            }
        }
    }

    report
}
