use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// One delivery of a queue message to a consumer.
///
/// The same message may be delivered again after a negative acknowledgment
/// with requeue, or after its consumer released it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: Uuid,
    /// Raw message body: a UTF-8 URL string.
    pub body: String,
    /// How many times this message has been handed out, this delivery included.
    pub delivery_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Durable work queue with explicit acknowledgment.
///
/// `next_delivery` must claim atomically (e.g. `SELECT FOR UPDATE SKIP LOCKED`)
/// so two consumers never hold the same message.
pub trait TaskQueue: Send + Sync + Clone {
    /// Producer side: append a message.
    fn publish(&self, body: &str) -> impl Future<Output = Result<Delivery, AppError>> + Send;

    /// Claim the next pending message for `consumer_id`. `None` when the queue is empty.
    fn next_delivery(
        &self,
        consumer_id: &str,
    ) -> impl Future<Output = Result<Option<Delivery>, AppError>> + Send;

    /// Remove the message permanently.
    fn ack(&self, delivery_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Reject the message. With `requeue` it becomes pending again, otherwise it is removed.
    fn nack(
        &self,
        delivery_id: Uuid,
        requeue: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Return every in-flight message held by `consumer_id` to the queue.
    fn release_consumer(
        &self,
        consumer_id: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Number of pending messages.
    fn depth(&self) -> impl Future<Output = Result<i64, AppError>> + Send;
}
