use async_trait::async_trait;
use sqlx::types::Json;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    application::repos::{CalendarsRepo, RepoError},
    domain::{
        entities::{AllowedHours, CalendarRecord, NotifyConfig, OwnerContact},
        types::HolidayPolicy,
    },
};

use super::{DbTimeZone, PostgresRepositories, map_sqlx_error, util::to_unsigned};

const CALENDAR_COLUMNS: &str = "id, token, title, owner_id, timezone, allowed_weekdays, \
    holidays_policy, allow_holiday_eves, allowed_hours, min_duration_hours, threshold, \
    lock_participants, start_date, end_date, notify, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CalendarRow {
    id: Uuid,
    token: String,
    title: String,
    owner_id: Uuid,
    timezone: DbTimeZone,
    allowed_weekdays: Vec<i16>,
    holidays_policy: HolidayPolicy,
    allow_holiday_eves: bool,
    allowed_hours: Json<AllowedHours>,
    min_duration_hours: i32,
    threshold: i32,
    lock_participants: bool,
    start_date: Option<Date>,
    end_date: Option<Date>,
    notify: Json<NotifyConfig>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CalendarRow> for CalendarRecord {
    type Error = RepoError;

    fn try_from(row: CalendarRow) -> Result<Self, Self::Error> {
        let allowed_weekdays = row
            .allowed_weekdays
            .into_iter()
            .filter(|day| (0..=6).contains(day))
            .map(|day| to_unsigned::<u8>(i64::from(day), "allowed_weekdays"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: row.id,
            token: row.token,
            title: row.title,
            owner_id: row.owner_id,
            timezone: row.timezone.into(),
            allowed_weekdays,
            holidays_policy: row.holidays_policy,
            allow_holiday_eves: row.allow_holiday_eves,
            allowed_hours: row.allowed_hours.0,
            min_duration_hours: to_unsigned(
                i64::from(row.min_duration_hours),
                "min_duration_hours",
            )?,
            threshold: to_unsigned(i64::from(row.threshold), "threshold")?,
            lock_participants: row.lock_participants,
            start_date: row.start_date,
            end_date: row.end_date,
            notify: row.notify.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OwnerRow {
    name: String,
    email: String,
}

impl PostgresRepositories {
    async fn fetch_calendar(
        &self,
        column: &str,
        bind: CalendarKey<'_>,
    ) -> Result<Option<CalendarRecord>, RepoError> {
        let sql = format!("SELECT {CALENDAR_COLUMNS} FROM calendars WHERE {column} = $1");
        let query = sqlx::query_as::<_, CalendarRow>(&sql);
        let query = match bind {
            CalendarKey::Token(token) => query.bind(token),
            CalendarKey::Id(id) => query.bind(id),
        };

        let row = query
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(CalendarRecord::try_from).transpose()
    }
}

enum CalendarKey<'a> {
    Token(&'a str),
    Id(Uuid),
}

#[async_trait]
impl CalendarsRepo for PostgresRepositories {
    async fn find_by_token(&self, token: &str) -> Result<Option<CalendarRecord>, RepoError> {
        self.fetch_calendar("token", CalendarKey::Token(token)).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CalendarRecord>, RepoError> {
        self.fetch_calendar("id", CalendarKey::Id(id)).await
    }

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<OwnerContact>, RepoError> {
        let row = sqlx::query_as::<_, OwnerRow>("SELECT name, email FROM users WHERE id = $1")
            .bind(owner_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|row| OwnerContact {
            name: row.name,
            email: row.email,
        }))
    }
}
