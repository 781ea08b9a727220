//! Notification fan-out for agenda changes.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::schedule::AccessResolver;
use crate::store::Store;
use crate::types::{AgendaDetails, Notification, NotificationType};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Renders the message for `kind`. Dates are shown in `tz`.
pub fn render_message(details: &AgendaDetails, kind: NotificationType, tz: Tz) -> String {
    let agenda = &details.agenda;
    let date = agenda.start_time.with_timezone(&tz).format("%Y-%m-%d");

    match kind {
        NotificationType::Created => format!(
            "New agenda \"{}\" in {} on {} has been created",
            agenda.title, details.room.name, date
        ),
        NotificationType::Updated => format!(
            "Agenda \"{}\" in {} on {} has been updated",
            agenda.title, details.room.name, date
        ),
        NotificationType::Cancelled => format!("Agenda \"{}\" has been cancelled", agenda.title),
    }
}

pub struct Notifier {
    store: Arc<dyn Store>,
    resolver: AccessResolver,
    batch_size: usize,
    time_zone: Tz,
}

impl Notifier {
    pub fn new(store: Arc<dyn Store>, batch_size: usize, time_zone: Tz) -> Self {
        Self {
            resolver: AccessResolver::new(store.clone()),
            store,
            batch_size: batch_size.max(1),
            time_zone,
        }
    }

    /// Notifies the agenda's current recipients. Returns the number of
    /// notifications written; a missing agenda writes none.
    pub fn notify(&self, agenda_id: &str, kind: NotificationType) -> Result<usize> {
        let Some(details) = self.store.get_agenda_details(agenda_id)? else {
            return Ok(0);
        };
        let recipients = self.resolver.recipients_for(&details.agenda)?;
        self.announce(&details, &recipients, kind)
    }

    /// Writes one notification per recipient in chunks of the batch size.
    /// Use this when recipients were resolved before the grants changed,
    /// as on cancellation.
    pub fn announce(
        &self,
        details: &AgendaDetails,
        recipients: &BTreeSet<String>,
        kind: NotificationType,
    ) -> Result<usize> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let message = render_message(details, kind, self.time_zone);
        let agenda_id = match kind {
            NotificationType::Cancelled => None,
            _ => Some(details.agenda.id.clone()),
        };
        let created_at = Utc::now();

        let recipients: Vec<&String> = recipients.iter().collect();
        for chunk in recipients.chunks(self.batch_size) {
            let batch: Vec<Notification> = chunk
                .iter()
                .map(|user_id| Notification {
                    id: Uuid::new_v4().to_string(),
                    kind,
                    message: message.clone(),
                    read: false,
                    created_at,
                    agenda_id: agenda_id.clone(),
                    user_id: (*user_id).clone(),
                })
                .collect();
            self.store.insert_notifications(&batch)?;
        }

        debug!(
            agenda_id = %details.agenda.id,
            %kind,
            "Sent {} notifications",
            recipients.len()
        );
        Ok(recipients.len())
    }
}
