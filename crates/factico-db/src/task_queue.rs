//! The durable task bus.
//!
//! A `PostgreSQL`-backed FIFO queue with delayed delivery, at-least-once
//! semantics, per-kind retry policies, unique-key deduplication, and a
//! dead-letter stream. Dequeue claims rows with `FOR UPDATE SKIP LOCKED`
//! under a visibility timeout; tasks a crashed worker never acked reappear
//! once the timeout lapses.
//!
//! Ordering: roughly FIFO within a kind (by `available_at`), higher
//! priority first. No cross-task guarantees; handlers must be idempotent
//! keyed on the payload's primary id.

use std::time::Duration;

use chrono::{DateTime, Utc};
use factico_types::{RetryPolicy, TaskId, TaskKind, TaskMessage};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Options accepted by [`TaskQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Delay before the task becomes available.
    pub delay: Option<Duration>,
    /// Deduplication key; while an unfinished task holds it, enqueues with
    /// the same key return the existing id.
    pub unique_key: Option<String>,
    /// Higher dequeues first.
    pub priority: i16,
}

/// A row from the `tasks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    kind: String,
    payload: serde_json::Value,
    attempt: i32,
    priority: i16,
    unique_key: Option<String>,
    enqueued_at: DateTime<Utc>,
    available_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_message(self) -> Result<TaskMessage, DbError> {
        let kind = TaskKind::parse(&self.kind)
            .ok_or_else(|| DbError::Decode(format!("unknown task kind: {}", self.kind)))?;
        Ok(TaskMessage {
            id: TaskId::from(self.id),
            kind,
            payload: self.payload,
            attempt: self.attempt,
            enqueued_at: self.enqueued_at,
            available_at: self.available_at,
            unique_key: self.unique_key,
            priority: self.priority,
        })
    }
}

/// The task bus handle.
pub struct TaskQueue<'a> {
    pool: &'a PgPool,
}

impl<'a> TaskQueue<'a> {
    /// Create a task queue bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a task.
    ///
    /// With a `unique_key`, an unfinished task holding the same key makes
    /// this a no-op returning the existing id (the dedup law of §4.B).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn enqueue(
        &self,
        kind: TaskKind,
        payload: &serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<TaskId, DbError> {
        if let Some(key) = &opts.unique_key
            && let Some(existing) = self.find_active_by_key(key).await?
        {
            return Ok(existing);
        }

        let id = TaskId::new();
        let delay_secs = opts.delay.map_or(0.0, |d| d.as_secs_f64());

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r"INSERT INTO tasks (id, kind, payload, priority, unique_key, available_at)
              VALUES ($1, $2, $3, $4, $5, now() + make_interval(secs => $6))
              ON CONFLICT (unique_key)
                  WHERE unique_key IS NOT NULL AND state IN ('ready', 'in_flight')
                  DO NOTHING
              RETURNING id",
        )
        .bind(id.into_inner())
        .bind(kind.as_str())
        .bind(payload)
        .bind(opts.priority)
        .bind(&opts.unique_key)
        .bind(delay_secs)
        .fetch_optional(self.pool)
        .await?;

        match inserted {
            Some((new_id,)) => {
                tracing::debug!(task_id = %new_id, kind = kind.as_str(), "Enqueued task");
                Ok(TaskId::from(new_id))
            }
            // Lost a race on the unique key; the winner's id is the result.
            None => match &opts.unique_key {
                Some(key) => self
                    .find_active_by_key(key)
                    .await?
                    .ok_or_else(|| DbError::NotFound(format!("task with key {key}"))),
                None => Ok(id),
            },
        }
    }

    /// Dequeue up to `max` tasks for `worker_id`, hiding them for
    /// `visibility_timeout`. Also reaps tasks whose visibility lapsed so
    /// they are redeliverable in the same call.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn dequeue(
        &self,
        worker_id: &str,
        max: i64,
        visibility_timeout: Duration,
    ) -> Result<Vec<TaskMessage>, DbError> {
        self.reap_expired().await?;

        let rows: Vec<TaskRow> = sqlx::query_as(
            r"UPDATE tasks
              SET state = 'in_flight',
                  attempt = attempt + 1,
                  claimed_by = $1,
                  invisible_until = now() + make_interval(secs => $2)
              WHERE id IN (
                  SELECT id FROM tasks
                  WHERE state = 'ready' AND available_at <= now()
                  ORDER BY priority DESC, available_at, id
                  LIMIT $3
                  FOR UPDATE SKIP LOCKED
              )
              RETURNING id, kind, payload, attempt, priority, unique_key,
                        enqueued_at, available_at",
        )
        .bind(worker_id)
        .bind(visibility_timeout.as_secs_f64())
        .bind(max)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TaskRow::into_message).collect()
    }

    /// Finalize a task.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn ack(&self, task_id: TaskId) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE tasks SET state = 'done', completed_at = now(), invisible_until = NULL
              WHERE id = $1 AND state = 'in_flight'",
        )
        .bind(task_id.into_inner())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a failure and reschedule per the kind's retry policy.
    ///
    /// Attempts exhausted moves the task to the dead-letter stream.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on failure, including an unknown task id.
    pub async fn nack(&self, task_id: TaskId, reason: &str) -> Result<(), DbError> {
        let row: Option<(String, i32)> =
            sqlx::query_as("SELECT kind, attempt FROM tasks WHERE id = $1")
                .bind(task_id.into_inner())
                .fetch_optional(self.pool)
                .await?;
        let (kind_str, attempt) =
            row.ok_or_else(|| DbError::NotFound(format!("task {task_id}")))?;
        let kind = TaskKind::parse(&kind_str)
            .ok_or_else(|| DbError::Decode(format!("unknown task kind: {kind_str}")))?;

        let policy = RetryPolicy::for_kind(kind);
        if policy.should_retry(attempt) {
            let backoff = policy.backoff_for_attempt(attempt);
            let jitter_secs = if policy.jitter.is_zero() {
                0
            } else {
                rand::rng().random_range(0..=policy.jitter.as_secs())
            };
            let delay = backoff
                .saturating_add(Duration::from_secs(jitter_secs))
                .as_secs_f64();

            sqlx::query(
                r"UPDATE tasks
                  SET state = 'ready', last_error = $2, invisible_until = NULL,
                      available_at = now() + make_interval(secs => $3)
                  WHERE id = $1",
            )
            .bind(task_id.into_inner())
            .bind(reason)
            .bind(delay)
            .execute(self.pool)
            .await?;
            tracing::warn!(
                task_id = %task_id,
                kind = kind.as_str(),
                attempt = attempt,
                backoff_secs = delay,
                reason = reason,
                "Task nacked, rescheduled"
            );
        } else {
            sqlx::query(
                r"UPDATE tasks
                  SET state = 'dead', last_error = $2, invisible_until = NULL,
                      completed_at = now()
                  WHERE id = $1",
            )
            .bind(task_id.into_inner())
            .bind(reason)
            .execute(self.pool)
            .await?;
            tracing::error!(
                task_id = %task_id,
                kind = kind.as_str(),
                attempt = attempt,
                reason = reason,
                "Task dead-lettered"
            );
        }
        Ok(())
    }

    /// The dead-letter stream, newest first, with failure history.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn dead_letters(&self, limit: i64) -> Result<Vec<DeadLetter>, DbError> {
        let rows: Vec<(Uuid, String, serde_json::Value, i32, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(
                r"SELECT id, kind, payload, attempt, last_error, completed_at
                  FROM tasks WHERE state = 'dead'
                  ORDER BY completed_at DESC
                  LIMIT $1",
            )
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, kind, payload, attempt, last_error, dead_at)| DeadLetter {
                task_id: TaskId::from(id),
                kind,
                payload,
                attempts: attempt,
                last_error,
                dead_at,
            })
            .collect())
    }

    /// Make tasks whose visibility timeout lapsed redeliverable.
    async fn reap_expired(&self) -> Result<(), DbError> {
        let reaped = sqlx::query(
            r"UPDATE tasks
              SET state = 'ready', claimed_by = NULL, invisible_until = NULL
              WHERE state = 'in_flight' AND invisible_until < now()",
        )
        .execute(self.pool)
        .await?;
        if reaped.rows_affected() > 0 {
            tracing::warn!(
                count = reaped.rows_affected(),
                "Reaped tasks with lapsed visibility"
            );
        }
        Ok(())
    }

    /// Find an unfinished task holding a unique key.
    async fn find_active_by_key(&self, key: &str) -> Result<Option<TaskId>, DbError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r"SELECT id FROM tasks
              WHERE unique_key = $1 AND state IN ('ready', 'in_flight')",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(id,)| TaskId::from(id)))
    }
}

/// An entry in the dead-letter stream.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// The dead task's id.
    pub task_id: TaskId,
    /// Task kind string (kept raw; dead rows may predate a kind rename).
    pub kind: String,
    /// The payload as enqueued.
    pub payload: serde_json::Value,
    /// Delivery attempts before dead-lettering.
    pub attempts: i32,
    /// The final failure reason.
    pub last_error: Option<String>,
    /// When the task was dead-lettered.
    pub dead_at: DateTime<Utc>,
}
