//! Message rendering for email and chat channels.

use askama::Template;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::application::notify::recipients::Recipient;
use crate::domain::clock::format_date;
use crate::domain::entities::CalendarRecord;
use crate::domain::transition::ThresholdTransition;
use crate::domain::types::TransitionKind;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

#[derive(Template)]
#[template(path = "email/threshold.html")]
struct ThresholdEmailTemplate<'a> {
    subject: &'a str,
    recipient_name: &'a str,
    calendar_title: &'a str,
    date: &'a str,
    reached: bool,
    new_count: u32,
    threshold: u32,
    calendar_link: &'a str,
    cancel_link: Option<String>,
}

#[derive(Template)]
#[template(path = "chat/threshold.txt")]
struct ThresholdChatTemplate<'a> {
    calendar_title: &'a str,
    date: &'a str,
    reached: bool,
    new_count: u32,
    threshold: u32,
    calendar_link: &'a str,
}

/// Builds public links and renders notification bodies.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    public_base_url: Url,
}

impl MessageRenderer {
    pub fn new(public_base_url: Url) -> Self {
        Self { public_base_url }
    }

    pub fn subject(calendar: &CalendarRecord, transition: &ThresholdTransition) -> String {
        let date = format_date(transition.date);
        match transition.kind {
            TransitionKind::ThresholdLost => {
                format!("{}: {date} no longer meets the threshold", calendar.title)
            }
            _ => format!("{}: {date} reached the threshold", calendar.title),
        }
    }

    /// Public calendar page, deep-linked to a participant when known.
    pub fn calendar_link(&self, token: &str, participant_id: Option<Uuid>) -> String {
        let mut url = self.calendar_url(token, &[]);
        if let Some(id) = participant_id {
            url.query_pairs_mut()
                .append_pair("participant", &id.to_string());
        }
        url.into()
    }

    /// One-click link cancelling a participant's availability on a date.
    pub fn cancel_link(&self, token: &str, participant_id: Uuid, date: &str) -> String {
        let mut url = self.calendar_url(token, &["cancel"]);
        url.query_pairs_mut()
            .append_pair("participant", &participant_id.to_string())
            .append_pair("date", date);
        url.into()
    }

    pub fn render_email(
        &self,
        calendar: &CalendarRecord,
        transition: &ThresholdTransition,
        recipient: &Recipient,
    ) -> Result<RenderedEmail, RenderError> {
        let subject = Self::subject(calendar, transition);
        let date = format_date(transition.date);
        let calendar_link = self.calendar_link(&calendar.token, recipient.participant_id);
        let cancel_link = recipient
            .participant_id
            .map(|id| self.cancel_link(&calendar.token, id, &date));

        let html = ThresholdEmailTemplate {
            subject: &subject,
            recipient_name: &recipient.name,
            calendar_title: &calendar.title,
            date: &date,
            reached: transition.kind == TransitionKind::ThresholdReached,
            new_count: transition.new_count,
            threshold: transition.threshold,
            calendar_link: &calendar_link,
            cancel_link,
        }
        .render()?;

        Ok(RenderedEmail { subject, html })
    }

    pub fn render_chat(
        &self,
        calendar: &CalendarRecord,
        transition: &ThresholdTransition,
    ) -> Result<String, RenderError> {
        let date = format_date(transition.date);
        let calendar_link = self.calendar_link(&calendar.token, None);
        let text = ThresholdChatTemplate {
            calendar_title: &calendar.title,
            date: &date,
            reached: transition.kind == TransitionKind::ThresholdReached,
            new_count: transition.new_count,
            threshold: transition.threshold,
            calendar_link: &calendar_link,
        }
        .render()?;
        Ok(text)
    }

    fn calendar_url(&self, token: &str, suffix: &[&str]) -> Url {
        let mut url = self.public_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("c").push(token).extend(suffix);
        }
        url
    }
}
