use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use super::dto::{AgendaInput, AgendaPage};
use super::response::{ActionError, ActionResponse, ErrorCode, StoreOptionExt, StoreResultExt};
use super::validation::validate_agenda;
use crate::auth::{Session, require_admin};
use crate::error::Error;
use crate::schedule::diff_access;
use crate::store::AgendaFilter;
use crate::types::{Agenda, AgendaDetails, NotificationType, Role, Room, SyncStatus};

const CONFLICT_MESSAGE: &str = "There is a scheduling conflict with another agenda in this room";

/// Deduplicates the requested lecturer ids, keeping first-seen order, and
/// checks each one names an existing lecturer.
fn resolve_lecturers(state: &AppState, ids: &[String]) -> Result<Vec<String>, ActionError> {
    let mut seen = BTreeSet::new();
    let mut resolved = Vec::new();

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let user = state
            .store
            .get_user(id)
            .action_err(ErrorCode::ServerError, "Failed to check lecturer")?;
        match user {
            Some(u) if u.role == Role::Dosen => resolved.push(id.clone()),
            _ => {
                return Err(ActionError::validation(Default::default())
                    .with_field("accessDosen", format!("Unknown lecturer: {id}")));
            }
        }
    }

    Ok(resolved)
}

fn require_room(state: &AppState, room_id: &str) -> Result<Room, ActionError> {
    state
        .store
        .get_room(room_id)
        .action_err(ErrorCode::ServerError, "Failed to load room")?
        .or_code(ErrorCode::NotFound, "Room not found")
}

fn check_conflict(
    state: &AppState,
    input: &AgendaInput,
    exclude: Option<&str>,
) -> Result<(), ActionError> {
    let conflict = state
        .conflicts
        .has_conflict(&input.room_id, input.start_time, input.end_time, exclude)
        .action_err(ErrorCode::ServerError, "Failed to check room availability")?;

    if conflict {
        return Err(ActionError::conflict(CONFLICT_MESSAGE));
    }
    Ok(())
}

fn map_write_error(err: Error) -> ActionError {
    match err {
        Error::Conflict(_) => ActionError::conflict(CONFLICT_MESSAGE),
        Error::NotFound => ActionError::not_found("Agenda not found"),
        e => {
            error!("Failed to save agenda: {}", e);
            ActionError::server("Failed to save agenda")
        }
    }
}

fn load_details(state: &AppState, id: &str) -> Result<AgendaDetails, ActionError> {
    state
        .store
        .get_agenda_details(id)
        .action_err(ErrorCode::ServerError, "Failed to load agenda")?
        .or_code(ErrorCode::NotFound, "Agenda not found")
}

fn notify(state: &AppState, agenda_id: &str, kind: NotificationType) {
    if let Err(e) = state.notifier.notify(agenda_id, kind) {
        error!(agenda_id, %kind, "Failed to send notifications: {}", e);
    }
}

/// Persists a new agenda, mirrors it to the calendar and notifies its
/// audience. A calendar failure is recorded on the agenda and does not
/// fail the action.
pub async fn create_agenda(
    state: &AppState,
    session: Option<&Session>,
    input: AgendaInput,
) -> ActionResponse<Agenda> {
    create(state, session, input).await.into()
}

async fn create(
    state: &AppState,
    session: Option<&Session>,
    input: AgendaInput,
) -> Result<Agenda, ActionError> {
    let session = require_admin(session)?;
    validate_agenda(&input).map_err(ActionError::validation)?;
    require_room(state, &input.room_id)?;

    let access_ids = match (&input.access_dosen, input.access_all_dosen) {
        (Some(ids), false) => resolve_lecturers(state, ids)?,
        _ => Vec::new(),
    };

    check_conflict(state, &input, None)?;

    let now = Utc::now();
    let agenda = Agenda {
        id: Uuid::new_v4().to_string(),
        title: input.title.trim().to_string(),
        description: input.description.filter(|d| !d.is_empty()),
        start_time: input.start_time,
        end_time: input.end_time,
        priority: input.priority,
        room_id: input.room_id,
        created_by_id: session.user_id.clone(),
        access_mahasiswa: input.access_mahasiswa,
        access_all_dosen: input.access_all_dosen,
        google_event_id: None,
        sync_status: SyncStatus::Pending,
        sync_error: None,
        last_sync_attempt: None,
        created_at: now,
        updated_at: now,
    };

    state
        .store
        .insert_agenda_checked(&agenda, &access_ids)
        .map_err(map_write_error)?;
    info!(agenda_id = %agenda.id, room_id = %agenda.room_id, "Created agenda");

    let details = load_details(state, &agenda.id)?;
    if let Err(e) = state.calendar.create(&details).await {
        warn!(agenda_id = %agenda.id, "Calendar sync deferred: {}", e);
    }

    notify(state, &agenda.id, NotificationType::Created);

    Ok(load_details(state, &agenda.id)?.agenda)
}

/// Applies the form to an existing agenda, reconciles its grants, then
/// re-syncs and notifies.
pub async fn update_agenda(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
    input: AgendaInput,
) -> ActionResponse<Agenda> {
    update(state, session, id, input).await.into()
}

async fn update(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
    input: AgendaInput,
) -> Result<Agenda, ActionError> {
    require_admin(session)?;
    validate_agenda(&input).map_err(ActionError::validation)?;

    let existing = state
        .store
        .get_agenda(id)
        .action_err(ErrorCode::ServerError, "Failed to load agenda")?
        .or_code(ErrorCode::NotFound, "Agenda not found")?;

    require_room(state, &input.room_id)?;

    let desired_access = match (&input.access_dosen, input.access_all_dosen) {
        (Some(ids), false) => Some(resolve_lecturers(state, ids)?),
        _ => None,
    };

    check_conflict(state, &input, Some(id))?;

    let agenda = Agenda {
        title: input.title.trim().to_string(),
        description: input.description.filter(|d| !d.is_empty()),
        start_time: input.start_time,
        end_time: input.end_time,
        priority: input.priority,
        room_id: input.room_id,
        access_mahasiswa: input.access_mahasiswa,
        access_all_dosen: input.access_all_dosen,
        updated_at: Utc::now(),
        ..existing
    };

    state
        .store
        .update_agenda_checked(&agenda)
        .map_err(map_write_error)?;

    if agenda.access_all_dosen {
        state
            .store
            .clear_agenda_access(id)
            .action_err(ErrorCode::ServerError, "Failed to update agenda access")?;
    } else if let Some(desired) = desired_access {
        let existing_ids: Vec<String> = state
            .store
            .list_agenda_access(id)
            .action_err(ErrorCode::ServerError, "Failed to load agenda access")?
            .into_iter()
            .map(|a| a.user_id)
            .collect();

        let diff = diff_access(&existing_ids, &desired);
        if !diff.to_remove.is_empty() {
            state
                .store
                .remove_agenda_access(id, &diff.to_remove)
                .action_err(ErrorCode::ServerError, "Failed to update agenda access")?;
        }
        if !diff.to_add.is_empty() {
            state
                .store
                .add_agenda_access(id, &diff.to_add)
                .action_err(ErrorCode::ServerError, "Failed to update agenda access")?;
        }
    }
    info!(agenda_id = %id, "Updated agenda");

    let details = load_details(state, id)?;
    if let Err(e) = state.calendar.update(&details).await {
        warn!(agenda_id = %id, "Calendar sync deferred: {}", e);
    }

    notify(state, id, NotificationType::Updated);

    Ok(load_details(state, id)?.agenda)
}

/// Removes the calendar event first; the agenda is only deleted once the
/// event is gone. Recipients are resolved before grants are dropped so the
/// cancellation reaches the same audience.
pub async fn delete_agenda(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
) -> ActionResponse<Agenda> {
    delete(state, session, id).await.into()
}

async fn delete(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
) -> Result<Agenda, ActionError> {
    require_admin(session)?;

    let details = load_details(state, id)?;
    let recipients = state
        .access
        .recipients_for(&details.agenda)
        .action_err(ErrorCode::ServerError, "Failed to resolve recipients")?;

    if let Err(e) = state.calendar.delete(&details.agenda).await {
        return Err(ActionError::server(format!(
            "Failed to delete calendar event: {e}"
        )));
    }

    state
        .store
        .clear_agenda_access(id)
        .action_err(ErrorCode::ServerError, "Failed to delete agenda access")?;
    state
        .store
        .delete_agenda_notifications(id)
        .action_err(ErrorCode::ServerError, "Failed to delete notifications")?;

    if let Err(e) = state
        .notifier
        .announce(&details, &recipients, NotificationType::Cancelled)
    {
        error!(agenda_id = %id, "Failed to send cancellations: {}", e);
    }

    state
        .store
        .delete_agenda(id)
        .action_err(ErrorCode::ServerError, "Failed to delete agenda")?;
    info!(agenda_id = %id, "Deleted agenda");

    Ok(details.agenda)
}

/// An agenda with its room and granted lecturers, if the caller may see it.
pub fn get_agenda(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
) -> ActionResponse<AgendaDetails> {
    get(state, session, id).into()
}

fn get(state: &AppState, session: Option<&Session>, id: &str) -> Result<AgendaDetails, ActionError> {
    let session = session.ok_or_else(ActionError::unauthorized)?;
    let details = load_details(state, id)?;

    if !session.is_admin() {
        let visible = details.agenda.created_by_id == session.user_id
            || details.agenda.access_all_dosen
            || details.access_dosen.iter().any(|u| u.id == session.user_id);
        if !visible {
            return Err(ActionError::not_found("Agenda not found"));
        }
    }

    Ok(details)
}

fn map_listing_error(err: Error) -> ActionError {
    match err {
        Error::NotFound => ActionError::new(ErrorCode::UserNotFound, "User not found"),
        e => {
            error!("Failed to list agendas: {}", e);
            ActionError::server("Failed to list agendas")
        }
    }
}

/// The caller's visible agendas, narrowed by `filter`, with the total
/// count before paging.
pub fn list_visible_agendas(
    state: &AppState,
    session: Option<&Session>,
    filter: &AgendaFilter,
) -> ActionResponse<AgendaPage> {
    list(state, session, filter).into()
}

fn list(
    state: &AppState,
    session: Option<&Session>,
    filter: &AgendaFilter,
) -> Result<AgendaPage, ActionError> {
    let session = session.ok_or_else(ActionError::unauthorized)?;

    let agendas = state
        .access
        .visible_agendas(&session.user_id, filter)
        .map_err(map_listing_error)?;
    let total = state
        .access
        .count_visible_agendas(&session.user_id, filter)
        .map_err(map_listing_error)?;

    Ok(AgendaPage { agendas, total })
}

/// Rooms free for the whole of `[start, end)`.
pub fn available_rooms(
    state: &AppState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ActionResponse<Vec<Room>> {
    if end <= start {
        return ActionResponse::failure(
            ActionError::validation(Default::default())
                .with_field("endTime", "End time must be after start time"),
        );
    }

    state
        .conflicts
        .available_rooms(start, end)
        .action_err(ErrorCode::ServerError, "Failed to search rooms")
        .into()
}
