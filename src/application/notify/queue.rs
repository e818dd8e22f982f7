//! Hand-off from the mutation path to background notification work.
//!
//! Mutations publish a [`TransitionCheck`] and return. The worker recounts the
//! date, classifies the transition and dispatches notifications on its own
//! tasks, detached from the request that triggered it.

use std::collections::VecDeque;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::{Arc, Mutex};

use metrics::{counter, gauge};
use time::{Date, OffsetDateTime};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{NotifyError, TransitionHandler};
use crate::domain::clock::format_date;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::notify::queue";
const METRIC_CHECKS_DROPPED: &str = "tandem_transition_checks_dropped_total";
const METRIC_QUEUE_LEN: &str = "tandem_transition_queue_len";

/// Request to re-evaluate a date after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCheck {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub date: Date,
    /// Count read before the mutation; `None` when it was unavailable.
    pub previous_count: Option<u32>,
    pub requested_at: OffsetDateTime,
}

impl TransitionCheck {
    pub fn new(calendar_id: Uuid, date: Date, previous_count: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            calendar_id,
            date,
            previous_count,
            requested_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Non-blocking sink for transition checks.
pub trait TransitionPublisher: Send + Sync {
    fn publish(&self, check: TransitionCheck);
}

/// Bounded channel feeding a [`NotificationWorker`]. A full queue drops checks.
#[derive(Clone)]
pub struct TransitionQueue {
    sender: mpsc::Sender<TransitionCheck>,
    capacity: usize,
}

impl TransitionQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<TransitionCheck>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, capacity }, receiver)
    }

    pub fn pending(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }
}

impl TransitionPublisher for TransitionQueue {
    fn publish(&self, check: TransitionCheck) {
        let check_id = check.id;
        let calendar_id = check.calendar_id;
        let date = format_date(check.date);

        match self.sender.try_send(check) {
            Ok(()) => {
                gauge!(METRIC_QUEUE_LEN).set(self.pending() as f64);
                debug!(
                    check_id = %check_id,
                    calendar_id = %calendar_id,
                    date = %date,
                    "Transition check enqueued"
                );
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!(METRIC_CHECKS_DROPPED, "reason" => "full").increment(1);
                warn!(
                    check_id = %check_id,
                    calendar_id = %calendar_id,
                    date = %date,
                    capacity = self.capacity,
                    "Transition check dropped: queue full"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                counter!(METRIC_CHECKS_DROPPED, "reason" => "closed").increment(1);
                warn!(
                    check_id = %check_id,
                    calendar_id = %calendar_id,
                    date = %date,
                    "Transition check dropped: worker stopped"
                );
            }
        }
    }
}

/// In-memory publisher drained by the caller, for foreground processing.
#[derive(Default)]
pub struct TransitionBuffer {
    queue: Mutex<VecDeque<TransitionCheck>>,
}

impl TransitionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending check in FIFO order.
    pub fn drain(&self) -> Vec<TransitionCheck> {
        mutex_lock(&self.queue, SOURCE, "drain").drain(..).collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransitionPublisher for TransitionBuffer {
    fn publish(&self, check: TransitionCheck) {
        mutex_lock(&self.queue, SOURCE, "publish").push_back(check);
    }
}

/// Consumes transition checks, one task per check, bounded by a semaphore.
pub struct NotificationWorker {
    handler: TransitionHandler,
    permits: Arc<Semaphore>,
    max_concurrent: u32,
}

impl NotificationWorker {
    pub fn new(handler: TransitionHandler, max_concurrent: u32) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            handler,
            permits: Arc::new(Semaphore::new(max_concurrent as usize)),
            max_concurrent,
        }
    }

    pub fn spawn(self, receiver: mpsc::Receiver<TransitionCheck>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Runs until every [`TransitionQueue`] handle is dropped.
    pub async fn run(self, mut receiver: mpsc::Receiver<TransitionCheck>) {
        info!("Notification worker started");
        while let Some(check) = receiver.recv().await {
            gauge!(METRIC_QUEUE_LEN).set(receiver.len() as f64);

            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            let handler = self.handler.clone();
            tokio::spawn(async move {
                let _permit = permit;
                process(&handler, check).await;
            });
        }

        // Let in-flight dispatches finish before reporting shutdown.
        let _ = self.permits.acquire_many(self.max_concurrent).await;
        info!("Notification worker stopped");
    }
}

/// Sizing of a background worker and the queue feeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub queue_capacity: NonZeroUsize,
    pub max_concurrent_dispatches: NonZeroU32,
}

/// Creates a bounded queue and spawns the worker draining it.
///
/// The worker stops after every clone of the returned queue is dropped and
/// its in-flight dispatches have finished.
pub fn spawn_worker(
    settings: WorkerSettings,
    handler: TransitionHandler,
) -> (TransitionQueue, JoinHandle<()>) {
    let (queue, receiver) = TransitionQueue::bounded(settings.queue_capacity.get());
    let worker = NotificationWorker::new(handler, settings.max_concurrent_dispatches.get());
    (queue, worker.spawn(receiver))
}

async fn process(handler: &TransitionHandler, check: TransitionCheck) {
    let check_id = check.id;
    match handler.handle(&check).await {
        Ok(outcome) => debug!(
            check_id = %check_id,
            kind = %outcome.transition.kind,
            sent = outcome.report.sent,
            "Transition check processed"
        ),
        Err(err @ NotifyError::CalendarNotFound) => warn!(
            check_id = %check_id,
            calendar_id = %check.calendar_id,
            error = %err,
            "Transition check skipped"
        ),
        Err(err) => error!(
            check_id = %check_id,
            calendar_id = %check.calendar_id,
            date = %format_date(check.date),
            error = %err,
            "Transition check failed"
        ),
    }
}
