use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ParticipantsRepo, RepoError},
    domain::entities::ParticipantRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    calendar_id: Uuid,
    name: String,
    email: Option<String>,
    email_verified: bool,
    created_at: OffsetDateTime,
}

impl From<ParticipantRow> for ParticipantRecord {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id,
            calendar_id: row.calendar_id,
            name: row.name,
            email: row.email,
            email_verified: row.email_verified,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ParticipantsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ParticipantRecord>, RepoError> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT id, calendar_id, name, email, email_verified, created_at
            FROM participants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_for_calendar(
        &self,
        calendar_id: Uuid,
    ) -> Result<Vec<ParticipantRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT id, calendar_id, name, email, email_verified, created_at
            FROM participants
            WHERE calendar_id = $1
            ORDER BY lower(name), id
            "#,
        )
        .bind(calendar_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
