#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono_tz::Tz;
use time::macros::date;
use time::{Date, Duration, OffsetDateTime};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use tandem::application::availability::{
    AvailabilityAggregator, AvailabilityService, RecurrenceService,
};
use tandem::application::notify::{
    ChannelError, ChatSender, ChatTarget, DispatchSettings, EmailSender, HandledCheck,
    NotificationChannels, NotificationDispatcher, ThresholdDetector, TransitionBuffer,
    TransitionHandler,
};
use tandem::application::repos::{
    AVAILABILITY_UNIQUE_CONSTRAINT, AvailabilityRepo, CalendarsRepo, CreateAvailabilityParams,
    CreateRecurrenceParams, EXCEPTION_UNIQUE_CONSTRAINT, NotificationKey, NotificationLogRepo,
    ParticipantsRepo, RecurrenceRepo, RepoError, UpdateAvailabilityParams,
    UpdateRecurrenceParams,
};
use tandem::domain::entities::{
    AvailabilityRecord, CalendarRecord, NotificationLogRecord, NotifyConfig, OwnerContact,
    ParticipantRecord, RecurrenceExceptionRecord, RecurrenceRecord,
};
use tandem::domain::types::HolidayPolicy;
use tandem::util::timezone::FixedClock;

pub const TOKEN: &str = "summer-trip";
pub const TODAY: Date = date!(2025 - 07 - 01);
pub const OWNER_EMAIL: &str = "owner@example.com";

#[derive(Default)]
pub struct MemoryStore {
    calendars: Mutex<HashMap<Uuid, CalendarRecord>>,
    owners: Mutex<HashMap<Uuid, OwnerContact>>,
    participants: Mutex<HashMap<Uuid, ParticipantRecord>>,
    availabilities: Mutex<HashMap<Uuid, AvailabilityRecord>>,
    recurrences: Mutex<HashMap<Uuid, RecurrenceRecord>>,
    exceptions: Mutex<HashMap<Uuid, RecurrenceExceptionRecord>>,
    log: Mutex<Vec<NotificationLogRecord>>,
    range_read_fault: AtomicBool,
    log_offline: AtomicBool,
}

impl MemoryStore {
    pub async fn insert_calendar(&self, calendar: CalendarRecord) {
        self.calendars.lock().await.insert(calendar.id, calendar);
    }

    pub async fn insert_owner(&self, owner_id: Uuid, name: &str, email: &str) {
        self.owners.lock().await.insert(
            owner_id,
            OwnerContact {
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub async fn add_participant(
        &self,
        calendar_id: Uuid,
        name: &str,
        email: Option<&str>,
        verified: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.participants.lock().await.insert(
            id,
            ParticipantRecord {
                id,
                calendar_id,
                name: name.to_string(),
                email: email.map(str::to_string),
                email_verified: verified,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        id
    }

    pub async fn log_entries(&self) -> Vec<NotificationLogRecord> {
        self.log.lock().await.clone()
    }

    pub async fn push_log(&self, record: NotificationLogRecord) {
        self.log.lock().await.push(record);
    }

    /// Makes the next availability range read time out.
    pub fn fail_next_range_read(&self) {
        self.range_read_fault.store(true, Ordering::SeqCst);
    }

    /// Makes every notification log lookup and write fail.
    pub fn take_log_offline(&self) {
        self.log_offline.store(true, Ordering::SeqCst);
    }

    fn check_log_online(&self) -> Result<(), RepoError> {
        if self.log_offline.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("notification log offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarsRepo for MemoryStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<CalendarRecord>, RepoError> {
        Ok(self
            .calendars
            .lock()
            .await
            .values()
            .find(|calendar| calendar.token == token)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CalendarRecord>, RepoError> {
        Ok(self.calendars.lock().await.get(&id).cloned())
    }

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<OwnerContact>, RepoError> {
        Ok(self.owners.lock().await.get(&owner_id).cloned())
    }
}

#[async_trait]
impl ParticipantsRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ParticipantRecord>, RepoError> {
        Ok(self.participants.lock().await.get(&id).cloned())
    }

    async fn list_for_calendar(
        &self,
        calendar_id: Uuid,
    ) -> Result<Vec<ParticipantRecord>, RepoError> {
        let mut participants: Vec<_> = self
            .participants
            .lock()
            .await
            .values()
            .filter(|participant| participant.calendar_id == calendar_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(participants)
    }
}

#[async_trait]
impl AvailabilityRepo for MemoryStore {
    async fn create_availability(
        &self,
        params: CreateAvailabilityParams,
    ) -> Result<AvailabilityRecord, RepoError> {
        let mut records = self.availabilities.lock().await;
        if records.values().any(|record| {
            record.participant_id == params.participant_id && record.date == params.date
        }) {
            return Err(RepoError::Duplicate {
                constraint: AVAILABILITY_UNIQUE_CONSTRAINT.to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = AvailabilityRecord {
            id: Uuid::new_v4(),
            participant_id: params.participant_id,
            calendar_id: params.calendar_id,
            date: params.date,
            start_time: params.start_time,
            end_time: params.end_time,
            note: params.note,
            source: params.source,
            created_at: now,
            updated_at: now,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_availability(
        &self,
        params: UpdateAvailabilityParams,
    ) -> Result<AvailabilityRecord, RepoError> {
        let mut records = self.availabilities.lock().await;
        let record = records.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.start_time = params.start_time;
        record.end_time = params.end_time;
        record.note = params.note;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_availability(
        &self,
        participant_id: Uuid,
        date: Date,
    ) -> Result<(), RepoError> {
        let mut records = self.availabilities.lock().await;
        let before = records.len();
        records.retain(|_, record| {
            !(record.participant_id == participant_id && record.date == date)
        });
        if records.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_for_participant(
        &self,
        participant_id: Uuid,
        date: Date,
    ) -> Result<Option<AvailabilityRecord>, RepoError> {
        Ok(self
            .availabilities
            .lock()
            .await
            .values()
            .find(|record| record.participant_id == participant_id && record.date == date)
            .cloned())
    }

    async fn list_for_participant(
        &self,
        participant_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<AvailabilityRecord>, RepoError> {
        let mut records: Vec<_> = self
            .availabilities
            .lock()
            .await
            .values()
            .filter(|record| {
                record.participant_id == participant_id && record.date >= from && record.date <= to
            })
            .cloned()
            .collect();
        records.sort_by_key(|record| record.date);
        Ok(records)
    }

    async fn list_for_range(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<AvailabilityRecord>, RepoError> {
        if self.range_read_fault.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(self
            .availabilities
            .lock()
            .await
            .values()
            .filter(|record| {
                record.calendar_id == calendar_id && record.date >= from && record.date <= to
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecurrenceRepo for MemoryStore {
    async fn create_recurrence(
        &self,
        params: CreateRecurrenceParams,
    ) -> Result<RecurrenceRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = RecurrenceRecord {
            id: Uuid::new_v4(),
            participant_id: params.participant_id,
            calendar_id: params.calendar_id,
            day_of_week: params.day_of_week,
            start_time: params.start_time,
            end_time: params.end_time,
            start_date: params.start_date,
            end_date: params.end_date,
            note: params.note,
            created_at: now,
            updated_at: now,
        };
        self.recurrences
            .lock()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_recurrence(
        &self,
        params: UpdateRecurrenceParams,
    ) -> Result<RecurrenceRecord, RepoError> {
        let mut records = self.recurrences.lock().await;
        let record = records.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.day_of_week = params.day_of_week;
        record.start_time = params.start_time;
        record.end_time = params.end_time;
        record.start_date = params.start_date;
        record.end_date = params.end_date;
        record.note = params.note;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_recurrence(&self, id: Uuid) -> Result<(), RepoError> {
        if self.recurrences.lock().await.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        self.exceptions
            .lock()
            .await
            .retain(|_, exception| exception.recurrence_id != id);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRecord>, RepoError> {
        Ok(self.recurrences.lock().await.get(&id).cloned())
    }

    async fn list_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<RecurrenceRecord>, RepoError> {
        let mut records: Vec<_> = self
            .recurrences
            .lock()
            .await
            .values()
            .filter(|record| record.participant_id == participant_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.day_of_week, record.start_date));
        Ok(records)
    }

    async fn list_for_range(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<RecurrenceRecord>, RepoError> {
        Ok(self
            .recurrences
            .lock()
            .await
            .values()
            .filter(|record| {
                record.calendar_id == calendar_id
                    && record.start_date <= to
                    && record.end_date.is_none_or(|end| end >= from)
            })
            .cloned()
            .collect())
    }

    async fn list_exceptions(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<RecurrenceExceptionRecord>, RepoError> {
        let recurrences = self.recurrences.lock().await;
        Ok(self
            .exceptions
            .lock()
            .await
            .values()
            .filter(|exception| {
                exception.date >= from
                    && exception.date <= to
                    && recurrences
                        .get(&exception.recurrence_id)
                        .is_some_and(|recurrence| recurrence.calendar_id == calendar_id)
            })
            .cloned()
            .collect())
    }

    async fn create_exception(
        &self,
        recurrence_id: Uuid,
        date: Date,
    ) -> Result<RecurrenceExceptionRecord, RepoError> {
        let mut exceptions = self.exceptions.lock().await;
        if exceptions
            .values()
            .any(|exception| exception.recurrence_id == recurrence_id && exception.date == date)
        {
            return Err(RepoError::Duplicate {
                constraint: EXCEPTION_UNIQUE_CONSTRAINT.to_string(),
            });
        }
        let record = RecurrenceExceptionRecord {
            id: Uuid::new_v4(),
            recurrence_id,
            date,
            created_at: OffsetDateTime::now_utc(),
        };
        exceptions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_exception(&self, recurrence_id: Uuid, date: Date) -> Result<(), RepoError> {
        let mut exceptions = self.exceptions.lock().await;
        let before = exceptions.len();
        exceptions.retain(|_, exception| {
            !(exception.recurrence_id == recurrence_id && exception.date == date)
        });
        if exceptions.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationLogRepo for MemoryStore {
    async fn was_sent_recently(
        &self,
        key: &NotificationKey,
        since: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        self.check_log_online()?;
        Ok(self.log.lock().await.iter().any(|entry| {
            entry.calendar_id == key.calendar_id
                && entry.date == key.date
                && entry.kind == key.kind
                && entry.recipient == key.recipient
                && entry.channel == key.channel
                && entry.sent_at >= since
        }))
    }

    async fn log(&self, record: NotificationLogRecord) -> Result<(), RepoError> {
        self.check_log_online()?;
        self.log.lock().await.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

pub struct RecordingEmail {
    configured: bool,
    failing: Vec<String>,
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmail {
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            failing: Vec::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Sends to these addresses fail with a relay error.
    pub fn failing_for(mut self, addresses: &[&str]) -> Self {
        self.failing = addresses.iter().map(|address| address.to_string()).collect();
        self
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ChannelError> {
        if self.failing.iter().any(|address| address == to) {
            return Err(ChannelError::Status {
                status: 503,
                body: "relay unavailable".to_string(),
            });
        }
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html_body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<(ChatTarget, String)>>,
}

impl RecordingChat {
    pub async fn sent(&self) -> Vec<(ChatTarget, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatSender for RecordingChat {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .await
            .push((target.clone(), text.to_string()));
        Ok(())
    }
}

pub fn calendar(threshold: u32) -> CalendarRecord {
    let now = OffsetDateTime::now_utc();
    CalendarRecord {
        id: Uuid::new_v4(),
        token: TOKEN.to_string(),
        title: "Summer trip".to_string(),
        owner_id: Uuid::new_v4(),
        timezone: Tz::UTC,
        allowed_weekdays: vec![0, 1, 2, 3, 4, 5, 6],
        holidays_policy: HolidayPolicy::Ignore,
        allow_holiday_eves: false,
        allowed_hours: Default::default(),
        min_duration_hours: 0,
        threshold,
        lock_participants: false,
        start_date: None,
        end_date: None,
        notify: NotifyConfig {
            enabled: true,
            notify_owner: true,
            notify_participants: true,
            ..Default::default()
        },
        created_at: now,
        updated_at: now,
    }
}

/// Services wired over one in-memory store, with transition checks buffered.
pub struct Harness {
    pub calendar: CalendarRecord,
    pub store: Arc<MemoryStore>,
    pub buffer: Arc<TransitionBuffer>,
    pub email: Arc<RecordingEmail>,
    pub chat: Arc<RecordingChat>,
    pub availability: AvailabilityService,
    pub recurrences: RecurrenceService,
    pub handler: TransitionHandler,
}

impl Harness {
    pub async fn new(calendar: CalendarRecord) -> Self {
        Self::with_email(calendar, RecordingEmail::new(true)).await
    }

    pub async fn with_email(calendar: CalendarRecord, email: RecordingEmail) -> Self {
        let store = Arc::new(MemoryStore::default());
        store.insert_calendar(calendar.clone()).await;
        store
            .insert_owner(calendar.owner_id, "Olivia Owner", OWNER_EMAIL)
            .await;

        let buffer = Arc::new(TransitionBuffer::new());
        let email = Arc::new(email);
        let chat = Arc::new(RecordingChat::default());

        let availability = AvailabilityService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            buffer.clone(),
        )
        .with_clock(Arc::new(FixedClock(TODAY)));
        let recurrences = RecurrenceService::new(store.clone(), store.clone(), store.clone());

        let aggregator = AvailabilityAggregator::new(store.clone(), store.clone(), store.clone());
        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            store.clone(),
            aggregator.clone(),
            store.clone(),
            NotificationChannels {
                email: email.clone(),
                chat: chat.clone(),
            },
            DispatchSettings {
                public_base_url: Url::parse("https://tandem.test/").expect("valid url"),
                dedup_window: Duration::minutes(60),
                outbound_timeout: StdDuration::from_secs(5),
            },
        );
        let handler = TransitionHandler::new(
            store.clone(),
            ThresholdDetector::new(aggregator),
            dispatcher,
        );

        Self {
            calendar,
            store,
            buffer,
            email,
            chat,
            availability,
            recurrences,
            handler,
        }
    }

    pub async fn participant(&self, name: &str) -> Uuid {
        let email = format!("{}@example.com", name.to_lowercase());
        self.store
            .add_participant(self.calendar.id, name, Some(&email), true)
            .await
    }

    /// Process every buffered transition check in order.
    pub async fn process_checks(&self) -> Vec<HandledCheck> {
        let mut handled = Vec::new();
        for check in self.buffer.drain() {
            handled.push(self.handler.handle(&check).await.expect("check handled"));
        }
        handled
    }
}
