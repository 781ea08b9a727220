use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{error, info, warn};

use super::log::{SyncLogger, truncate_message};
use super::provider::{
    CalendarEvent, CalendarProvider, EventAttendee, EventDateTime, ExtendedProperties,
    PrivateProperties, ProviderError,
};
use super::retry::{RetryPolicy, with_retry};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Agenda, AgendaDetails, Room, SyncLogStatus, SyncOperation, SyncStatus};

/// A calendar mirror operation failed. The agenda's sync fields already
/// hold the classified status and message.
#[derive(Debug, Clone, Error)]
#[error("Failed to {operation} calendar event for agenda {agenda_id}: {message}")]
pub struct CalendarSyncError {
    pub operation: SyncOperation,
    pub agenda_id: String,
    pub message: String,
    pub status: Option<u16>,
}

impl CalendarSyncError {
    fn new(operation: SyncOperation, agenda_id: &str, err: &ProviderError) -> Self {
        Self {
            operation,
            agenda_id: agenda_id.to_string(),
            message: err.message.clone(),
            status: err.status,
        }
    }
}

/// Reads the configured calendar id.
pub fn resolve_calendar_id(store: &dyn Store) -> Result<String> {
    store
        .get_calendar_shareable()?
        .map(|c| c.calendar_id)
        .ok_or_else(|| Error::Config("No Google Calendar configured".to_string()))
}

/// `Room: <name>` with the location in parentheses when set.
pub fn location_string(room: &Room) -> String {
    match room.location.as_deref().filter(|l| !l.is_empty()) {
        Some(location) => format!("Room: {} ({})", room.name, location),
        None => format!("Room: {}", room.name),
    }
}

fn event_time(at: &DateTime<Utc>, tz: Tz) -> EventDateTime {
    EventDateTime {
        date_time: at
            .with_timezone(&tz)
            .to_rfc3339_opts(SecondsFormat::Secs, false),
        time_zone: tz.name().to_string(),
    }
}

/// Builds the event body for an agenda. Lecturers without an email address
/// are left off the attendee list.
pub fn build_event(details: &AgendaDetails, tz: Tz) -> CalendarEvent {
    let agenda = &details.agenda;

    let attendees = details
        .access_dosen
        .iter()
        .filter_map(|user| {
            user.email.as_ref().map(|email| EventAttendee {
                display_name: user.name.clone(),
                email: email.clone(),
            })
        })
        .collect();

    CalendarEvent {
        summary: agenda.title.clone(),
        description: agenda.description.clone().unwrap_or_default(),
        location: location_string(&details.room),
        start: event_time(&agenda.start_time, tz),
        end: event_time(&agenda.end_time, tz),
        color_id: agenda.priority.color_id().to_string(),
        attendees,
        extended_properties: ExtendedProperties {
            private: PrivateProperties {
                agenda_id: agenda.id.clone(),
            },
        },
    }
}

/// Mirrors agendas into the external calendar and tracks the outcome on
/// each agenda's sync fields.
pub struct CalendarSync {
    store: Arc<dyn Store>,
    provider: Arc<dyn CalendarProvider>,
    log: SyncLogger,
    retry: RetryPolicy,
    time_zone: Tz,
}

impl CalendarSync {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn CalendarProvider>,
        retry: RetryPolicy,
        time_zone: Tz,
    ) -> Self {
        Self {
            log: SyncLogger::new(store.clone()),
            store,
            provider,
            retry,
            time_zone,
        }
    }

    fn calendar_id(&self) -> std::result::Result<String, ProviderError> {
        resolve_calendar_id(self.store.as_ref()).map_err(ProviderError::from)
    }

    /// Moves the agenda to `Pending` and stamps the attempt.
    fn begin_attempt(&self, agenda: &mut Agenda) -> Result<()> {
        agenda.sync_status = agenda.sync_status.transition(SyncStatus::Pending)?;
        agenda.last_sync_attempt = Some(Utc::now());
        self.store.save_agenda_sync(agenda)
    }

    fn settle(&self, agenda: &mut Agenda, status: SyncStatus, sync_error: Option<String>) -> Result<()> {
        agenda.sync_status = agenda.sync_status.transition(status)?;
        agenda.sync_error = sync_error;
        self.store.save_agenda_sync(agenda)
    }

    /// Records a classified create/update failure on the agenda and in the
    /// sync log, returning the error to raise.
    fn fail(&self, agenda: &mut Agenda, operation: SyncOperation, err: &ProviderError) -> Result<Error> {
        error!(
            agenda_id = %agenda.id,
            status = ?err.status,
            "Failed to {} calendar event: {}",
            operation,
            err.message
        );

        agenda.last_sync_attempt = Some(Utc::now());
        self.settle(
            agenda,
            SyncStatus::for_failure(err.status),
            Some(truncate_message(&err.message)),
        )?;
        self.log
            .record(&agenda.id, operation, SyncLogStatus::Failed, Some(&err.message));

        Ok(CalendarSyncError::new(operation, &agenda.id, err).into())
    }

    async fn insert(&self, event: &CalendarEvent) -> std::result::Result<String, ProviderError> {
        let calendar_id = self.calendar_id()?;
        with_retry(self.retry, ProviderError::is_transient, || {
            self.provider.insert_event(&calendar_id, event)
        })
        .await
    }

    async fn replace(
        &self,
        event_id: &str,
        event: &CalendarEvent,
    ) -> std::result::Result<(), ProviderError> {
        let calendar_id = self.calendar_id()?;
        with_retry(self.retry, ProviderError::is_transient, || {
            self.provider.update_event(&calendar_id, event_id, event)
        })
        .await
    }

    async fn remove(&self, event_id: &str) -> std::result::Result<(), ProviderError> {
        let calendar_id = self.calendar_id()?;
        with_retry(self.retry, ProviderError::is_transient, || {
            self.provider.delete_event(&calendar_id, event_id)
        })
        .await
    }

    /// Creates the external event and stores its id. Returns the event id.
    pub async fn create(&self, details: &AgendaDetails) -> Result<String> {
        let mut agenda = details.agenda.clone();
        self.begin_attempt(&mut agenda)?;

        let event = build_event(details, self.time_zone);

        match self.insert(&event).await {
            Ok(event_id) => {
                agenda.google_event_id = Some(event_id.clone());
                self.settle(&mut agenda, SyncStatus::Synced, None)?;
                self.log
                    .record(&agenda.id, SyncOperation::Create, SyncLogStatus::Success, None);
                info!(agenda_id = %agenda.id, event_id = %event_id, "Created calendar event");
                Ok(event_id)
            }
            Err(err) => Err(self.fail(&mut agenda, SyncOperation::Create, &err)?),
        }
    }

    /// Pushes the agenda's current fields to its external event, creating
    /// the event when it was never created or has vanished externally.
    pub async fn update(&self, details: &AgendaDetails) -> Result<String> {
        let mut agenda = details.agenda.clone();
        self.begin_attempt(&mut agenda)?;

        let Some(event_id) = agenda.google_event_id.clone() else {
            self.log.record(
                &agenda.id,
                SyncOperation::Update,
                SyncLogStatus::RedirectedToCreate,
                Some("No Google event ID found"),
            );
            return self.create(&with_agenda(details, agenda)).await;
        };

        let event = build_event(details, self.time_zone);

        match self.replace(&event_id, &event).await {
            Ok(()) => {
                self.settle(&mut agenda, SyncStatus::Synced, None)?;
                self.log
                    .record(&agenda.id, SyncOperation::Update, SyncLogStatus::Success, None);
                info!(agenda_id = %agenda.id, event_id = %event_id, "Updated calendar event");
                Ok(event_id)
            }
            Err(err) if err.is_not_found() => {
                warn!(
                    agenda_id = %agenda.id,
                    event_id = %event_id,
                    "Calendar event missing, creating a new one"
                );
                self.log.record(
                    &agenda.id,
                    SyncOperation::Update,
                    SyncLogStatus::NotFound,
                    Some("Event not found in Google Calendar, creating new event"),
                );

                agenda.google_event_id = None;
                self.store.save_agenda_sync(&agenda)?;

                match self.create(&with_agenda(details, agenda.clone())).await {
                    Ok(new_id) => Ok(new_id),
                    Err(e) => {
                        let message = e.to_string();
                        self.log.record(
                            &agenda.id,
                            SyncOperation::UpdateRecreate,
                            SyncLogStatus::Failed,
                            Some(&message),
                        );
                        let status = match &e {
                            Error::CalendarSync(inner) => inner.status,
                            _ => None,
                        };
                        Err(CalendarSyncError {
                            operation: SyncOperation::UpdateRecreate,
                            agenda_id: agenda.id.clone(),
                            message,
                            status,
                        }
                        .into())
                    }
                }
            }
            Err(err) => Err(self.fail(&mut agenda, SyncOperation::Update, &err)?),
        }
    }

    /// Deletes the external event. A missing event id or a 404 counts as
    /// already deleted.
    pub async fn delete(&self, agenda: &Agenda) -> Result<()> {
        let mut agenda = agenda.clone();

        let Some(event_id) = agenda.google_event_id.clone() else {
            self.log.record(
                &agenda.id,
                SyncOperation::Delete,
                SyncLogStatus::Skipped,
                Some("No Google event ID found"),
            );
            return Ok(());
        };

        self.begin_attempt(&mut agenda)?;

        match self.remove(&event_id).await {
            Ok(()) => {
                agenda.google_event_id = None;
                self.settle(&mut agenda, SyncStatus::Deleted, None)?;
                self.log
                    .record(&agenda.id, SyncOperation::Delete, SyncLogStatus::Success, None);
                info!(agenda_id = %agenda.id, event_id = %event_id, "Deleted calendar event");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                warn!(
                    agenda_id = %agenda.id,
                    event_id = %event_id,
                    "Calendar event already deleted"
                );
                self.log.record(
                    &agenda.id,
                    SyncOperation::Delete,
                    SyncLogStatus::NotFound,
                    Some("Event already deleted from Google Calendar"),
                );

                agenda.google_event_id = None;
                if let Err(e) = self.settle(&mut agenda, SyncStatus::Deleted, None) {
                    error!(agenda_id = %agenda.id, "Failed to update agenda after 404: {}", e);
                    self.log.record(
                        &agenda.id,
                        SyncOperation::DeleteDbUpdate,
                        SyncLogStatus::Failed,
                        Some(&e.to_string()),
                    );
                }
                Ok(())
            }
            Err(err) => {
                error!(
                    agenda_id = %agenda.id,
                    event_id = %event_id,
                    status = ?err.status,
                    "Failed to delete calendar event: {}",
                    err.message
                );

                agenda.last_sync_attempt = Some(Utc::now());
                if let Err(e) = self.settle(
                    &mut agenda,
                    SyncStatus::DeleteFailed,
                    Some(truncate_message(&err.message)),
                ) {
                    error!(agenda_id = %agenda.id, "Failed to record delete failure: {}", e);
                    self.log.record(
                        &agenda.id,
                        SyncOperation::DeleteDbUpdate,
                        SyncLogStatus::Failed,
                        Some(&e.to_string()),
                    );
                }
                self.log.record(
                    &agenda.id,
                    SyncOperation::Delete,
                    SyncLogStatus::Failed,
                    Some(&err.message),
                );

                Err(CalendarSyncError::new(SyncOperation::Delete, &agenda.id, &err).into())
            }
        }
    }

    /// Re-attempts the `limit` agendas whose last attempt failed, oldest
    /// attempt first. Returns how many succeeded.
    pub async fn retry_sync_failures(&self, limit: i64) -> Result<usize> {
        let agendas = self
            .store
            .list_agendas_by_sync_status(&SyncStatus::RETRYABLE, limit)?;

        let mut success_count = 0;

        for agenda in agendas {
            let outcome = if agenda.sync_status == SyncStatus::DeleteFailed {
                self.delete(&agenda).await
            } else {
                match self.store.get_agenda_details(&agenda.id) {
                    Ok(Some(details)) => self.update(&details).await.map(|_| ()),
                    Ok(None) => continue,
                    Err(e) => Err(e),
                }
            };

            match outcome {
                Ok(()) => success_count += 1,
                Err(e) => {
                    warn!(agenda_id = %agenda.id, "Retry failed: {}", e);
                    self.log.record(
                        &agenda.id,
                        SyncOperation::Retry,
                        SyncLogStatus::Failed,
                        Some(&e.to_string()),
                    );
                }
            }
        }

        info!("Calendar retry sweep finished: {} succeeded", success_count);
        Ok(success_count)
    }
}

fn with_agenda(details: &AgendaDetails, agenda: Agenda) -> AgendaDetails {
    AgendaDetails {
        agenda,
        room: details.room.clone(),
        access_dosen: details.access_dosen.clone(),
    }
}
