use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{NotificationKey, NotificationLogRepo, RepoError},
    domain::entities::NotificationLogRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl NotificationLogRepo for PostgresRepositories {
    async fn was_sent_recently(
        &self,
        key: &NotificationKey,
        since: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM notification_log
                WHERE calendar_id = $1
                  AND date = $2
                  AND kind = $3
                  AND recipient = $4
                  AND channel = $5
                  AND sent_at >= $6
            )
            "#,
        )
        .bind(key.calendar_id)
        .bind(key.date)
        .bind(key.kind)
        .bind(&key.recipient)
        .bind(key.channel)
        .bind(since)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }

    async fn log(&self, record: NotificationLogRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO notification_log (id, calendar_id, date, kind, recipient, channel, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.calendar_id)
        .bind(record.date)
        .bind(record.kind)
        .bind(record.recipient)
        .bind(record.channel)
        .bind(record.sent_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
