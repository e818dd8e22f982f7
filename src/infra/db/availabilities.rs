use async_trait::async_trait;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::{
    application::repos::{
        AvailabilityRepo, CreateAvailabilityParams, RepoError, UpdateAvailabilityParams,
    },
    domain::{entities::AvailabilityRecord, types::AvailabilitySource},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AvailabilityRow {
    id: Uuid,
    participant_id: Uuid,
    calendar_id: Uuid,
    date: Date,
    start_time: Option<Time>,
    end_time: Option<Time>,
    note: Option<String>,
    source: AvailabilitySource,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<AvailabilityRow> for AvailabilityRecord {
    fn from(row: AvailabilityRow) -> Self {
        Self {
            id: row.id,
            participant_id: row.participant_id,
            calendar_id: row.calendar_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            note: row.note,
            source: row.source,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AvailabilityRepo for PostgresRepositories {
    async fn create_availability(
        &self,
        params: CreateAvailabilityParams,
    ) -> Result<AvailabilityRecord, RepoError> {
        let row = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            INSERT INTO availabilities (
                id, participant_id, calendar_id, date, start_time, end_time, note, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, participant_id, calendar_id, date, start_time, end_time, note,
                      source, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.participant_id)
        .bind(params.calendar_id)
        .bind(params.date)
        .bind(params.start_time)
        .bind(params.end_time)
        .bind(params.note)
        .bind(params.source)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_availability(
        &self,
        params: UpdateAvailabilityParams,
    ) -> Result<AvailabilityRecord, RepoError> {
        let row = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            UPDATE availabilities
            SET start_time = $2,
                end_time = $3,
                note = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING id, participant_id, calendar_id, date, start_time, end_time, note,
                      source, created_at, updated_at
            "#,
        )
        .bind(params.id)
        .bind(params.start_time)
        .bind(params.end_time)
        .bind(params.note)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(Into::into).ok_or(RepoError::NotFound)
    }

    async fn delete_availability(
        &self,
        participant_id: Uuid,
        date: Date,
    ) -> Result<(), RepoError> {
        let result =
            sqlx::query("DELETE FROM availabilities WHERE participant_id = $1 AND date = $2")
                .bind(participant_id)
                .bind(date)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_for_participant(
        &self,
        participant_id: Uuid,
        date: Date,
    ) -> Result<Option<AvailabilityRecord>, RepoError> {
        let row = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            SELECT id, participant_id, calendar_id, date, start_time, end_time, note,
                   source, created_at, updated_at
            FROM availabilities
            WHERE participant_id = $1 AND date = $2
            "#,
        )
        .bind(participant_id)
        .bind(date)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_for_participant(
        &self,
        participant_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<AvailabilityRecord>, RepoError> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            SELECT id, participant_id, calendar_id, date, start_time, end_time, note,
                   source, created_at, updated_at
            FROM availabilities
            WHERE participant_id = $1 AND date BETWEEN $2 AND $3
            ORDER BY date
            "#,
        )
        .bind(participant_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_for_range(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<AvailabilityRecord>, RepoError> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            SELECT id, participant_id, calendar_id, date, start_time, end_time, note,
                   source, created_at, updated_at
            FROM availabilities
            WHERE calendar_id = $1 AND date BETWEEN $2 AND $3
            ORDER BY date, participant_id
            "#,
        )
        .bind(calendar_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
