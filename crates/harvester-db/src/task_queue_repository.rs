use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use harvester_core::error::AppError;
use harvester_core::task_queue::{Delivery, TaskQueue};

/// PostgreSQL-backed work queue using `SELECT FOR UPDATE SKIP LOCKED`.
///
/// Messages live in `listing_tasks`, partitioned by queue name. A claimed
/// message is `in_flight` until it is acked (deleted), nacked, or its
/// consumer is released. A claim older than the visibility timeout is
/// treated as abandoned and handed out again.
#[derive(Clone)]
pub struct PgTaskQueue {
    pool: Pool<Postgres>,
    queue: String,
    visibility_timeout: Duration,
}

/// Default age after which an unsettled claim can be taken by another consumer.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(600);

impl PgTaskQueue {
    pub fn new(pool: PgPool, queue: impl Into<String>) -> Self {
        Self {
            pool,
            queue: queue.into(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    pub fn name(&self) -> &str {
        &self.queue
    }

    /// Number of claimed, unacknowledged messages.
    pub async fn in_flight(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM listing_tasks WHERE queue = $1 AND status = 'in_flight'"#,
        )
        .bind(&self.queue)
        .fetch_one(&self.pool)
        .await
        .map_err(queue_error)?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    body: String,
    delivery_count: i32,
    enqueued_at: DateTime<Utc>,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Delivery {
            id: row.id,
            body: row.body,
            delivery_count: row.delivery_count.max(0) as u32,
            enqueued_at: row.enqueued_at,
        }
    }
}

fn queue_error(e: sqlx::Error) -> AppError {
    AppError::QueueError(e.to_string())
}

impl TaskQueue for PgTaskQueue {
    async fn publish(&self, body: &str) -> Result<Delivery, AppError> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            INSERT INTO listing_tasks (queue, body)
            VALUES ($1, $2)
            RETURNING id, body, delivery_count, enqueued_at
            "#,
        )
        .bind(&self.queue)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(queue_error)?;

        Ok(row.into())
    }

    async fn next_delivery(&self, consumer_id: &str) -> Result<Option<Delivery>, AppError> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            UPDATE listing_tasks
            SET status = 'in_flight', consumer_id = $2, claimed_at = NOW(),
                delivery_count = delivery_count + 1
            WHERE id = (
                SELECT id FROM listing_tasks
                WHERE queue = $1
                  AND (status = 'pending'
                       OR (status = 'in_flight'
                           AND claimed_at < NOW() - make_interval(secs => $3)))
                ORDER BY enqueued_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, body, delivery_count, enqueued_at
            "#,
        )
        .bind(&self.queue)
        .bind(consumer_id)
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(queue_error)?;

        Ok(row.map(Into::into))
    }

    async fn ack(&self, delivery_id: Uuid) -> Result<(), AppError> {
        sqlx::query(r#"DELETE FROM listing_tasks WHERE id = $1"#)
            .bind(delivery_id)
            .execute(&self.pool)
            .await
            .map_err(queue_error)?;
        Ok(())
    }

    async fn nack(&self, delivery_id: Uuid, requeue: bool) -> Result<(), AppError> {
        if !requeue {
            return self.ack(delivery_id).await;
        }

        // Requeued messages go to the back of the queue.
        sqlx::query(
            r#"
            UPDATE listing_tasks
            SET status = 'pending', consumer_id = NULL, claimed_at = NULL, enqueued_at = NOW()
            WHERE id = $1 AND status = 'in_flight'
            "#,
        )
        .bind(delivery_id)
        .execute(&self.pool)
        .await
        .map_err(queue_error)?;
        Ok(())
    }

    async fn release_consumer(&self, consumer_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE listing_tasks
            SET status = 'pending', consumer_id = NULL, claimed_at = NULL
            WHERE queue = $1 AND consumer_id = $2 AND status = 'in_flight'
            "#,
        )
        .bind(&self.queue)
        .bind(consumer_id)
        .execute(&self.pool)
        .await
        .map_err(queue_error)?;

        Ok(result.rows_affected())
    }

    async fn depth(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM listing_tasks WHERE queue = $1 AND status = 'pending'"#,
        )
        .bind(&self.queue)
        .fetch_one(&self.pool)
        .await
        .map_err(queue_error)?;
        Ok(count)
    }
}
