//! Operator notifications.
//!
//! Provider hard failures and adapter auth failures land here (in addition
//! to the tracing output) so operators have a durable queue to work from.

use chrono::{DateTime, Utc};
use factico_types::{Notification, NotificationId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `notifications` table.
pub struct NotificationStore<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationStore<'a> {
    /// Create a notification store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an operator notification.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn notify(&self, kind: &str, message: &str) -> Result<NotificationId, DbError> {
        let id = NotificationId::new();
        sqlx::query("INSERT INTO notifications (id, kind, message) VALUES ($1, $2, $3)")
            .bind(id.into_inner())
            .bind(kind)
            .bind(message)
            .execute(self.pool)
            .await?;
        tracing::error!(kind = kind, message = message, "Operator notification raised");
        Ok(id)
    }

    /// Unacknowledged notifications, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn unacknowledged(&self, limit: i64) -> Result<Vec<Notification>, DbError> {
        let rows: Vec<(Uuid, String, String, bool, DateTime<Utc>)> = sqlx::query_as(
            r"SELECT id, kind, message, acknowledged, created_at
              FROM notifications
              WHERE NOT acknowledged
              ORDER BY created_at
              LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, kind, message, acknowledged, created_at)| Notification {
                id: NotificationId::from(id),
                kind,
                message,
                acknowledged,
                created_at,
            })
            .collect())
    }

    /// Acknowledge a notification.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn acknowledge(&self, id: NotificationId) -> Result<(), DbError> {
        sqlx::query("UPDATE notifications SET acknowledged = TRUE WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
