use async_trait::async_trait;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateRecurrenceParams, RecurrenceRepo, RepoError, UpdateRecurrenceParams,
    },
    domain::entities::{RecurrenceExceptionRecord, RecurrenceRecord},
};

use super::{PostgresRepositories, map_sqlx_error, util::to_unsigned};

const RECURRENCE_COLUMNS: &str = "id, participant_id, calendar_id, day_of_week, start_time, \
    end_time, start_date, end_date, note, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct RecurrenceRow {
    id: Uuid,
    participant_id: Uuid,
    calendar_id: Uuid,
    day_of_week: i16,
    start_time: Option<Time>,
    end_time: Option<Time>,
    start_date: Date,
    end_date: Option<Date>,
    note: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<RecurrenceRow> for RecurrenceRecord {
    type Error = RepoError;

    fn try_from(row: RecurrenceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            participant_id: row.participant_id,
            calendar_id: row.calendar_id,
            day_of_week: to_unsigned(i64::from(row.day_of_week), "day_of_week")?,
            start_time: row.start_time,
            end_time: row.end_time,
            start_date: row.start_date,
            end_date: row.end_date,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExceptionRow {
    id: Uuid,
    recurrence_id: Uuid,
    date: Date,
    created_at: OffsetDateTime,
}

impl From<ExceptionRow> for RecurrenceExceptionRecord {
    fn from(row: ExceptionRow) -> Self {
        Self {
            id: row.id,
            recurrence_id: row.recurrence_id,
            date: row.date,
            created_at: row.created_at,
        }
    }
}

fn convert_rows(rows: Vec<RecurrenceRow>) -> Result<Vec<RecurrenceRecord>, RepoError> {
    rows.into_iter().map(RecurrenceRecord::try_from).collect()
}

#[async_trait]
impl RecurrenceRepo for PostgresRepositories {
    async fn create_recurrence(
        &self,
        params: CreateRecurrenceParams,
    ) -> Result<RecurrenceRecord, RepoError> {
        let sql = format!(
            "INSERT INTO recurrences (id, participant_id, calendar_id, day_of_week, start_time, \
             end_time, start_date, end_date, note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {RECURRENCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RecurrenceRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.participant_id)
            .bind(params.calendar_id)
            .bind(i16::from(params.day_of_week))
            .bind(params.start_time)
            .bind(params.end_time)
            .bind(params.start_date)
            .bind(params.end_date)
            .bind(params.note)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.try_into()
    }

    async fn update_recurrence(
        &self,
        params: UpdateRecurrenceParams,
    ) -> Result<RecurrenceRecord, RepoError> {
        let sql = format!(
            "UPDATE recurrences \
             SET day_of_week = $2, start_time = $3, end_time = $4, start_date = $5, \
                 end_date = $6, note = $7, updated_at = now() \
             WHERE id = $1 \
             RETURNING {RECURRENCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RecurrenceRow>(&sql)
            .bind(params.id)
            .bind(i16::from(params.day_of_week))
            .bind(params.start_time)
            .bind(params.end_time)
            .bind(params.start_date)
            .bind(params.end_date)
            .bind(params.note)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn delete_recurrence(&self, id: Uuid) -> Result<(), RepoError> {
        // Exceptions go with the recurrence through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM recurrences WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRecord>, RepoError> {
        let sql = format!("SELECT {RECURRENCE_COLUMNS} FROM recurrences WHERE id = $1");
        let row = sqlx::query_as::<_, RecurrenceRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(RecurrenceRecord::try_from).transpose()
    }

    async fn list_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<RecurrenceRecord>, RepoError> {
        let sql = format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurrences \
             WHERE participant_id = $1 \
             ORDER BY day_of_week, start_date, id"
        );
        let rows = sqlx::query_as::<_, RecurrenceRow>(&sql)
            .bind(participant_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_rows(rows)
    }

    async fn list_for_range(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<RecurrenceRecord>, RepoError> {
        let sql = format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurrences \
             WHERE calendar_id = $1 \
               AND start_date <= $3 \
               AND (end_date IS NULL OR end_date >= $2) \
             ORDER BY participant_id, day_of_week, start_date"
        );
        let rows = sqlx::query_as::<_, RecurrenceRow>(&sql)
            .bind(calendar_id)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_rows(rows)
    }

    async fn list_exceptions(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<RecurrenceExceptionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ExceptionRow>(
            r#"
            SELECT e.id, e.recurrence_id, e.date, e.created_at
            FROM recurrence_exceptions e
            INNER JOIN recurrences r ON r.id = e.recurrence_id
            WHERE r.calendar_id = $1 AND e.date BETWEEN $2 AND $3
            ORDER BY e.date, e.recurrence_id
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

    async fn create_exception(
        &self,
        recurrence_id: Uuid,
        date: Date,
    ) -> Result<RecurrenceExceptionRecord, RepoError> {
        let row = sqlx::query_as::<_, ExceptionRow>(
            r#"
            INSERT INTO recurrence_exceptions (id, recurrence_id, date)
            VALUES ($1, $2, $3)
            RETURNING id, recurrence_id, date, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recurrence_id)
        .bind(date)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_exception(&self, recurrence_id: Uuid, date: Date) -> Result<(), RepoError> {
        let result =
            sqlx::query("DELETE FROM recurrence_exceptions WHERE recurrence_id = $1 AND date = $2")
                .bind(recurrence_id)
                .bind(date)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
