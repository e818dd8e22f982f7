mod support;

use std::num::{NonZeroU32, NonZeroUsize};

use time::OffsetDateTime;
use time::macros::date;
use uuid::Uuid;

use tandem::application::availability::CreateAvailabilityCommand;
use tandem::application::notify::{
    ChatTarget, TransitionCheck, TransitionPublisher, WorkerSettings, spawn_worker,
};
use tandem::domain::entities::{
    ChannelConfigs, NotificationLogRecord, TelegramChannelConfig, WebhookChannelConfig,
};
use tandem::domain::types::{NotifyChannel, TransitionKind};

use support::{Harness, OWNER_EMAIL, RecordingEmail, TOKEN, calendar};

const DATE: &str = "2025-07-04";

fn all_day() -> CreateAvailabilityCommand {
    CreateAvailabilityCommand {
        date: DATE.to_string(),
        ..Default::default()
    }
}

fn worker_settings(queue_capacity: usize) -> WorkerSettings {
    WorkerSettings {
        queue_capacity: NonZeroUsize::new(queue_capacity).expect("non-zero capacity"),
        max_concurrent_dispatches: NonZeroU32::MIN,
    }
}

async fn make_available(harness: &Harness, participant: Uuid) {
    harness
        .availability
        .create_availability(TOKEN, participant, all_day())
        .await
        .expect("availability created");
}

#[tokio::test]
async fn only_verified_available_participants_are_emailed() {
    let harness = Harness::new(calendar(2)).await;
    let ada = harness.participant("Ada").await;
    let unverified = harness
        .store
        .add_participant(harness.calendar.id, "Uma", Some("uma@example.com"), false)
        .await;
    // Registered, but never marks the date.
    harness.participant("Brian").await;

    make_available(&harness, ada).await;
    make_available(&harness, unverified).await;
    let handled = harness.process_checks().await;

    assert_eq!(handled[1].transition.kind, TransitionKind::ThresholdReached);
    let mut recipients: Vec<_> = harness
        .email
        .sent()
        .await
        .into_iter()
        .map(|email| email.to)
        .collect();
    recipients.sort();
    assert_eq!(recipients, vec!["ada@example.com", OWNER_EMAIL]);
}

#[tokio::test]
async fn owner_sharing_a_participant_address_gets_one_email() {
    let harness = Harness::new(calendar(1)).await;
    let olivia = harness
        .store
        .add_participant(harness.calendar.id, "Olivia", Some("OWNER@example.com"), true)
        .await;

    make_available(&harness, olivia).await;
    let handled = harness.process_checks().await;

    assert_eq!(handled[0].report.sent, 1);
    let sent = harness.email.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, OWNER_EMAIL);
    assert!(sent[0].html.contains(&format!("participant={olivia}")));
    assert!(sent[0].html.contains("/cancel?"));

    let log = harness.store.log_entries().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].recipient, OWNER_EMAIL);
}

#[tokio::test]
async fn recently_logged_recipients_are_skipped() {
    let harness = Harness::new(calendar(1)).await;
    let ada = harness.participant("Ada").await;
    harness
        .store
        .push_log(NotificationLogRecord {
            id: Uuid::new_v4(),
            calendar_id: harness.calendar.id,
            date: date!(2025 - 07 - 04),
            kind: TransitionKind::ThresholdReached,
            recipient: OWNER_EMAIL.to_string(),
            channel: NotifyChannel::Email,
            sent_at: OffsetDateTime::now_utc(),
        })
        .await;

    make_available(&harness, ada).await;
    let handled = harness.process_checks().await;

    let report = handled[0].report;
    assert_eq!((report.sent, report.skipped, report.failed), (1, 1, 0));
    let sent = harness.email.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
}

#[tokio::test]
async fn repeated_transition_is_deduplicated() {
    let harness = Harness::new(calendar(1)).await;
    let ada = harness.participant("Ada").await;
    make_available(&harness, ada).await;
    harness.process_checks().await;
    assert_eq!(harness.email.sent().await.len(), 2);

    let replay = TransitionCheck::new(harness.calendar.id, date!(2025 - 07 - 04), Some(0));
    let handled = harness.handler.handle(&replay).await.expect("handled");

    assert_eq!(handled.transition.kind, TransitionKind::ThresholdReached);
    assert_eq!(handled.report.sent, 0);
    assert_eq!(handled.report.skipped, 2);
    assert_eq!(harness.email.sent().await.len(), 2);
    assert_eq!(harness.store.log_entries().await.len(), 2);
}

#[tokio::test]
async fn unconfigured_email_sends_nothing() {
    let harness = Harness::with_email(calendar(1), RecordingEmail::new(false)).await;
    let ada = harness.participant("Ada").await;

    make_available(&harness, ada).await;
    let handled = harness.process_checks().await;

    assert_eq!(handled[0].transition.kind, TransitionKind::ThresholdReached);
    assert_eq!(handled[0].report, Default::default());
    assert!(harness.email.sent().await.is_empty());
    assert!(harness.store.log_entries().await.is_empty());
}

#[tokio::test]
async fn disabled_notifications_send_nothing() {
    let mut cal = calendar(1);
    cal.notify.enabled = false;
    let harness = Harness::new(cal).await;
    let ada = harness.participant("Ada").await;

    make_available(&harness, ada).await;
    let handled = harness.process_checks().await;

    assert_eq!(handled[0].transition.kind, TransitionKind::ThresholdReached);
    assert!(harness.email.sent().await.is_empty());
    assert!(harness.chat.sent().await.is_empty());
}

#[tokio::test]
async fn failing_recipient_does_not_block_the_rest() {
    let email = RecordingEmail::new(true).failing_for(&["ada@example.com"]);
    let harness = Harness::with_email(calendar(1), email).await;
    let ada = harness.participant("Ada").await;

    make_available(&harness, ada).await;
    let handled = harness.process_checks().await;

    let report = handled[0].report;
    assert_eq!((report.sent, report.skipped, report.failed), (1, 0, 1));
    let sent = harness.email.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, OWNER_EMAIL);

    let log = harness.store.log_entries().await;
    assert_eq!(log.len(), 1, "failed sends are not logged");
}

#[tokio::test]
async fn chat_channels_notify_the_owner_once_per_channel() {
    let mut cal = calendar(1);
    cal.notify.notify_participants = false;
    cal.notify.channels = ChannelConfigs {
        discord: Some(WebhookChannelConfig {
            enabled: true,
            webhook_url: "https://discord.test/hook".to_string(),
        }),
        slack: Some(WebhookChannelConfig {
            enabled: true,
            webhook_url: "https://slack.test/hook".to_string(),
        }),
        telegram: Some(TelegramChannelConfig {
            enabled: false,
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        }),
    };
    let harness = Harness::new(cal).await;
    let ada = harness.participant("Ada").await;

    make_available(&harness, ada).await;
    let handled = harness.process_checks().await;
    assert_eq!(handled[0].report.sent, 3);

    let chat = harness.chat.sent().await;
    let targets: Vec<_> = chat.iter().map(|(target, _)| target.clone()).collect();
    assert_eq!(
        targets,
        vec![
            ChatTarget::Discord {
                webhook_url: "https://discord.test/hook".to_string()
            },
            ChatTarget::Slack {
                webhook_url: "https://slack.test/hook".to_string()
            },
        ]
    );
    assert!(chat[0].1.contains("Summer trip: 2025-07-04"));
    assert!(chat[0].1.contains("https://tandem.test/c/summer-trip"));

    // Participants are opted out, so only the owner is emailed.
    let emails = harness.email.sent().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, OWNER_EMAIL);

    let mut channels: Vec<_> = harness
        .store
        .log_entries()
        .await
        .into_iter()
        .map(|entry| (entry.channel, entry.recipient))
        .collect();
    channels.sort_by_key(|(channel, _)| channel.as_str());
    assert_eq!(
        channels,
        vec![
            (NotifyChannel::Discord, OWNER_EMAIL.to_string()),
            (NotifyChannel::Email, OWNER_EMAIL.to_string()),
            (NotifyChannel::Slack, OWNER_EMAIL.to_string()),
        ]
    );
}

#[tokio::test]
async fn background_worker_delivers_queued_checks() {
    let harness = Harness::new(calendar(2)).await;
    let ada = harness.participant("Ada").await;
    let brian = harness.participant("Brian").await;
    make_available(&harness, ada).await;
    make_available(&harness, brian).await;

    let (queue, worker) = spawn_worker(worker_settings(8), harness.handler.clone());
    for check in harness.buffer.drain() {
        queue.publish(check);
    }
    drop(queue);
    worker.await.expect("worker finished");

    let mut recipients: Vec<_> = harness
        .email
        .sent()
        .await
        .into_iter()
        .map(|email| email.to)
        .collect();
    recipients.sort();
    assert_eq!(
        recipients,
        vec!["ada@example.com", "brian@example.com", OWNER_EMAIL]
    );
}

#[tokio::test]
async fn checks_beyond_the_configured_capacity_are_dropped() {
    let harness = Harness::new(calendar(1)).await;
    let ada = harness.participant("Ada").await;
    for date in ["2025-07-04", "2025-07-05"] {
        harness
            .availability
            .create_availability(
                TOKEN,
                ada,
                CreateAvailabilityCommand {
                    date: date.to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("availability created");
    }

    // The worker task only starts receiving once this test yields.
    let (queue, worker) = spawn_worker(worker_settings(1), harness.handler.clone());
    for check in harness.buffer.drain() {
        queue.publish(check);
    }
    drop(queue);
    worker.await.expect("worker finished");

    let dates: Vec<_> = harness
        .store
        .log_entries()
        .await
        .into_iter()
        .map(|entry| entry.date)
        .collect();
    assert!(!dates.is_empty());
    assert!(dates.iter().all(|date| *date == date!(2025 - 07 - 04)));
}

#[tokio::test]
async fn notification_log_outage_does_not_block_delivery() {
    let harness = Harness::new(calendar(1)).await;
    let ada = harness.participant("Ada").await;
    harness.store.take_log_offline();

    make_available(&harness, ada).await;
    let handled = harness.process_checks().await;
    assert_eq!(handled[0].report.sent, 2);
    assert_eq!(handled[0].report.failed, 0);

    // Without a readable log there is nothing to deduplicate against.
    let replay = TransitionCheck::new(harness.calendar.id, date!(2025 - 07 - 04), Some(0));
    let handled = harness.handler.handle(&replay).await.expect("handled");
    assert_eq!(handled.report.sent, 2);
    assert_eq!(handled.report.skipped, 0);

    assert_eq!(harness.email.sent().await.len(), 4);
    assert!(harness.store.log_entries().await.is_empty());
}
