//! Recipient collection for threshold notifications.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::entities::{NotifyConfig, OwnerContact, ParticipantRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: String,
    /// Known when the recipient is, or could be matched to, a participant.
    pub participant_id: Option<Uuid>,
    pub is_owner: bool,
}

/// Deduplicated email recipients, owner first.
///
/// The owner is matched to an available participant by display name so their
/// links can be personalized. Participants qualify only with a verified email and an
/// availability on the date. Addresses compare case-insensitively and the
/// first claim wins.
pub fn collect_recipients(
    notify: &NotifyConfig,
    owner: Option<&OwnerContact>,
    participants: &[ParticipantRecord],
    available: &HashSet<Uuid>,
) -> Vec<Recipient> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut recipients: Vec<Recipient> = Vec::new();

    if notify.notify_owner
        && let Some(owner) = owner
        && let Some(key) = email_key(&owner.email)
    {
        let matched = participants.iter().find(|participant| {
            available.contains(&participant.id)
                && participant.name.trim().eq_ignore_ascii_case(owner.name.trim())
        });
        seen.insert(key, recipients.len());
        recipients.push(Recipient {
            email: owner.email.trim().to_string(),
            name: owner.name.clone(),
            participant_id: matched.map(|participant| participant.id),
            is_owner: true,
        });
    }

    if notify.notify_participants {
        for participant in participants {
            if !participant.email_verified || !available.contains(&participant.id) {
                continue;
            }
            let Some(email) = participant.email.as_deref() else {
                continue;
            };
            let Some(key) = email_key(email) else {
                continue;
            };
            if let Some(index) = seen.get(&key) {
                let existing = &mut recipients[*index];
                if existing.participant_id.is_none() {
                    existing.participant_id = Some(participant.id);
                }
                continue;
            }
            seen.insert(key, recipients.len());
            recipients.push(Recipient {
                email: email.trim().to_string(),
                name: participant.name.clone(),
                participant_id: Some(participant.id),
                is_owner: false,
            });
        }
    }

    recipients
}

fn email_key(email: &str) -> Option<String> {
    let trimmed = email.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}
