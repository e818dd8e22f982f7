use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use metrics::{counter, histogram};
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use url::Url;

use super::channels::{ChannelError, ChatSender, ChatTarget, EmailSender};
use super::recipients::{Recipient, collect_recipients};
use super::render::MessageRenderer;
use crate::application::availability::AvailabilityAggregator;
use crate::application::repos::{
    CalendarsRepo, NotificationKey, NotificationLogRepo, ParticipantsRepo,
};
use crate::domain::clock::format_date;
use crate::domain::entities::{CalendarRecord, OwnerContact};
use crate::domain::transition::ThresholdTransition;
use crate::domain::types::NotifyChannel;

const METRIC_SENT: &str = "tandem_notifications_sent_total";
const METRIC_SKIPPED: &str = "tandem_notifications_skipped_total";
const METRIC_FAILED: &str = "tandem_notifications_failed_total";
const METRIC_DISPATCH_MS: &str = "tandem_dispatch_ms";

/// Progress of a single dispatch, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Idle,
    TransitionDetected,
    RecipientsCollected,
    Dispatched,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: u32,
    /// Suppressed because an equivalent notification went out recently.
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub public_base_url: Url,
    pub dedup_window: Duration,
    pub outbound_timeout: StdDuration,
}

#[derive(Clone)]
pub struct NotificationChannels {
    pub email: Arc<dyn EmailSender>,
    pub chat: Arc<dyn ChatSender>,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    calendars: Arc<dyn CalendarsRepo>,
    participants: Arc<dyn ParticipantsRepo>,
    aggregator: AvailabilityAggregator,
    log: Arc<dyn NotificationLogRepo>,
    channels: NotificationChannels,
    renderer: MessageRenderer,
    dedup_window: Duration,
    outbound_timeout: StdDuration,
}

impl NotificationDispatcher {
    pub fn new(
        calendars: Arc<dyn CalendarsRepo>,
        participants: Arc<dyn ParticipantsRepo>,
        aggregator: AvailabilityAggregator,
        log: Arc<dyn NotificationLogRepo>,
        channels: NotificationChannels,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            calendars,
            participants,
            aggregator,
            log,
            channels,
            renderer: MessageRenderer::new(settings.public_base_url),
            dedup_window: settings.dedup_window,
            outbound_timeout: settings.outbound_timeout,
        }
    }

    /// Notify the owner's chat channels and every email recipient.
    ///
    /// Failures are logged and counted; they never stop the remaining sends.
    pub async fn dispatch(
        &self,
        calendar: &CalendarRecord,
        transition: &ThresholdTransition,
    ) -> DispatchReport {
        let started_at = Instant::now();
        let mut report = DispatchReport::default();

        if transition.kind.is_none() || !calendar.notify.enabled {
            log_stage(DispatchStage::Idle, transition);
            return report;
        }
        log_stage(DispatchStage::TransitionDetected, transition);

        let owner = self.load_owner(calendar).await;
        let recipients = self
            .load_recipients(calendar, transition, owner.as_ref())
            .await;
        log_stage(DispatchStage::RecipientsCollected, transition);

        self.dispatch_chat(calendar, transition, owner.as_ref(), &mut report)
            .await;
        self.dispatch_email(calendar, transition, &recipients, &mut report)
            .await;
        log_stage(DispatchStage::Dispatched, transition);

        histogram!(METRIC_DISPATCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            calendar_id = %calendar.id,
            date = %format_date(transition.date),
            kind = %transition.kind,
            recipients = recipients.len(),
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Threshold notifications dispatched"
        );

        report
    }

    async fn load_owner(&self, calendar: &CalendarRecord) -> Option<OwnerContact> {
        match self.calendars.find_owner(calendar.owner_id).await {
            Ok(owner) => owner,
            Err(err) => {
                warn!(
                    calendar_id = %calendar.id,
                    owner_id = %calendar.owner_id,
                    error = %err,
                    "Calendar owner lookup failed"
                );
                None
            }
        }
    }

    async fn load_recipients(
        &self,
        calendar: &CalendarRecord,
        transition: &ThresholdTransition,
        owner: Option<&OwnerContact>,
    ) -> Vec<Recipient> {
        let participants = match self.participants.list_for_calendar(calendar.id).await {
            Ok(participants) => participants,
            Err(err) => {
                warn!(calendar_id = %calendar.id, error = %err, "Participant lookup failed");
                Vec::new()
            }
        };

        let available: HashSet<_> = match self
            .aggregator
            .day_entries(calendar, transition.date)
            .await
        {
            Ok(entries) => entries.iter().map(|entry| entry.participant_id).collect(),
            Err(err) => {
                warn!(
                    calendar_id = %calendar.id,
                    error = %err,
                    "Availability lookup for recipients failed"
                );
                HashSet::new()
            }
        };

        collect_recipients(&calendar.notify, owner, &participants, &available)
    }

    async fn dispatch_chat(
        &self,
        calendar: &CalendarRecord,
        transition: &ThresholdTransition,
        owner: Option<&OwnerContact>,
        report: &mut DispatchReport,
    ) {
        let targets = ChatTarget::from_configs(&calendar.notify.channels);
        if targets.is_empty() {
            return;
        }

        let text = match self.renderer.render_chat(calendar, transition) {
            Ok(text) => text,
            Err(err) => {
                error!(calendar_id = %calendar.id, error = %err, "Chat message rendering failed");
                for target in &targets {
                    record_failure(report, target.channel());
                }
                return;
            }
        };

        let recipient = owner
            .map(|owner| owner.email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| format!("owner:{}", calendar.owner_id));

        for target in &targets {
            let key = notification_key(transition, &recipient, target.channel());
            self.deliver(key, self.channels.chat.send(target, &text), report)
                .await;
        }
    }

    async fn dispatch_email(
        &self,
        calendar: &CalendarRecord,
        transition: &ThresholdTransition,
        recipients: &[Recipient],
        report: &mut DispatchReport,
    ) {
        if recipients.is_empty() {
            return;
        }
        if !self.channels.email.is_configured() {
            debug!(calendar_id = %calendar.id, "Email sender not configured; skipping email");
            return;
        }

        for recipient in recipients {
            let email = match self.renderer.render_email(calendar, transition, recipient) {
                Ok(email) => email,
                Err(err) => {
                    error!(
                        calendar_id = %calendar.id,
                        recipient = %recipient.email,
                        error = %err,
                        "Email rendering failed"
                    );
                    record_failure(report, NotifyChannel::Email);
                    continue;
                }
            };

            let key = notification_key(
                transition,
                &recipient.email.to_lowercase(),
                NotifyChannel::Email,
            );
            let send = self
                .channels
                .email
                .send(&recipient.email, &email.subject, &email.html);
            self.deliver(key, send, report).await;
        }
    }

    /// Send unless an equivalent notification is logged within the window.
    async fn deliver<F>(&self, key: NotificationKey, send: F, report: &mut DispatchReport)
    where
        F: Future<Output = Result<(), ChannelError>>,
    {
        let channel = key.channel;
        if self.recently_sent(&key).await {
            report.skipped += 1;
            counter!(METRIC_SKIPPED, "channel" => channel.as_str()).increment(1);
            debug!(
                channel = %channel,
                recipient = %key.recipient,
                "Notification suppressed as recently sent"
            );
            return;
        }

        let outcome = match tokio::time::timeout(self.outbound_timeout, send).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ChannelError::Timeout {
                seconds: self.outbound_timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(()) => {
                report.sent += 1;
                counter!(METRIC_SENT, "channel" => channel.as_str()).increment(1);
                let recipient = key.recipient.clone();
                if let Err(err) = self.log.log(key.into_record(OffsetDateTime::now_utc())).await {
                    warn!(
                        channel = %channel,
                        recipient = %recipient,
                        error = %err,
                        "Notification log write failed"
                    );
                }
            }
            Err(err) => {
                record_failure(report, channel);
                error!(
                    channel = %channel,
                    recipient = %key.recipient,
                    error = %err,
                    "Notification send failed"
                );
            }
        }
    }

    async fn recently_sent(&self, key: &NotificationKey) -> bool {
        let since = OffsetDateTime::now_utc()
            .checked_sub(self.dedup_window)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        match self.log.was_sent_recently(key, since).await {
            Ok(sent) => sent,
            Err(err) => {
                warn!(
                    channel = %key.channel,
                    error = %err,
                    "Notification log lookup failed; sending anyway"
                );
                false
            }
        }
    }
}

fn notification_key(
    transition: &ThresholdTransition,
    recipient: &str,
    channel: NotifyChannel,
) -> NotificationKey {
    NotificationKey {
        calendar_id: transition.calendar_id,
        date: transition.date,
        kind: transition.kind,
        recipient: recipient.to_string(),
        channel,
    }
}

fn record_failure(report: &mut DispatchReport, channel: NotifyChannel) {
    report.failed += 1;
    counter!(METRIC_FAILED, "channel" => channel.as_str()).increment(1);
}

fn log_stage(stage: DispatchStage, transition: &ThresholdTransition) {
    debug!(
        stage = ?stage,
        calendar_id = %transition.calendar_id,
        date = %format_date(transition.date),
        kind = %transition.kind,
        "Notification dispatch stage"
    );
}
