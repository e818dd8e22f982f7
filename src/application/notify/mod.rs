//! Threshold transition detection and notification delivery.

mod channels;
mod detector;
mod dispatcher;
mod queue;
mod recipients;
mod render;

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{CalendarsRepo, RepoError};
use crate::domain::entities::CalendarRecord;
use crate::domain::transition::ThresholdTransition;

pub use channels::{ChannelError, ChatSender, ChatTarget, EmailSender};
pub use detector::ThresholdDetector;
pub use dispatcher::{
    DispatchReport, DispatchSettings, DispatchStage, NotificationChannels, NotificationDispatcher,
};
pub use queue::{
    NotificationWorker, TransitionBuffer, TransitionCheck, TransitionPublisher, TransitionQueue,
    WorkerSettings, spawn_worker,
};
pub use recipients::{Recipient, collect_recipients};
pub use render::{MessageRenderer, RenderError, RenderedEmail};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("calendar not found")]
    CalendarNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of handling one transition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledCheck {
    pub transition: ThresholdTransition,
    pub report: DispatchReport,
}

/// Detects the transition behind a check and dispatches when it is not `none`.
#[derive(Clone)]
pub struct TransitionHandler {
    calendars: Arc<dyn CalendarsRepo>,
    detector: ThresholdDetector,
    dispatcher: NotificationDispatcher,
}

impl TransitionHandler {
    pub fn new(
        calendars: Arc<dyn CalendarsRepo>,
        detector: ThresholdDetector,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            calendars,
            detector,
            dispatcher,
        }
    }

    pub async fn handle(&self, check: &TransitionCheck) -> Result<HandledCheck, NotifyError> {
        let calendar = self
            .calendars
            .find_by_id(check.calendar_id)
            .await?
            .ok_or(NotifyError::CalendarNotFound)?;
        self.handle_for(&calendar, check).await
    }

    /// Same as [`handle`](Self::handle) with an already loaded calendar snapshot.
    pub async fn handle_for(
        &self,
        calendar: &CalendarRecord,
        check: &TransitionCheck,
    ) -> Result<HandledCheck, NotifyError> {
        let transition = self
            .detector
            .detect(calendar, check.date, check.previous_count)
            .await?;
        let report = self.dispatcher.dispatch(calendar, &transition).await;
        Ok(HandledCheck { transition, report })
    }
}
