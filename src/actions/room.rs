use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use super::dto::{IdResponse, RoomInput, SuccessResponse};
use super::response::{ActionError, ActionResponse, ErrorCode, StoreOptionExt, StoreResultExt};
use super::validation::validate_room;
use crate::auth::{Session, require_admin};
use crate::error::Error;
use crate::types::Room;

const ROOM_EXISTS: &str = "A room with that name already exists";

fn room_exists() -> ActionError {
    ActionError::new(ErrorCode::RoomExists, ROOM_EXISTS).with_field("name", ROOM_EXISTS)
}

fn map_room_write(err: Error, message: &'static str) -> ActionError {
    match err {
        Error::AlreadyExists => room_exists(),
        Error::NotFound => ActionError::new(ErrorCode::RoomNotFound, "Room not found"),
        e => {
            tracing::error!("{}: {}", message, e);
            ActionError::internal(message)
        }
    }
}

fn normalize(input: RoomInput) -> (String, Option<String>) {
    let location = input
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    (input.name.trim().to_string(), location)
}

pub fn create_room(
    state: &AppState,
    session: Option<&Session>,
    input: RoomInput,
) -> ActionResponse<IdResponse> {
    create(state, session, input).into()
}

fn create(
    state: &AppState,
    session: Option<&Session>,
    input: RoomInput,
) -> Result<IdResponse, ActionError> {
    require_admin(session)?;
    validate_room(&input).map_err(ActionError::validation)?;
    let (name, location) = normalize(input);

    let existing = state
        .store
        .get_room_by_name(&name)
        .action_err(ErrorCode::InternalError, "Failed to create room")?;
    if existing.is_some() {
        return Err(room_exists());
    }

    let room = Room {
        id: Uuid::new_v4().to_string(),
        name,
        location,
    };
    state
        .store
        .create_room(&room)
        .map_err(|e| map_room_write(e, "Failed to create room"))?;

    info!(room_id = %room.id, name = %room.name, "Created room");
    Ok(IdResponse { id: room.id })
}

pub fn update_room(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
    input: RoomInput,
) -> ActionResponse<IdResponse> {
    update(state, session, id, input).into()
}

fn update(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
    input: RoomInput,
) -> Result<IdResponse, ActionError> {
    require_admin(session)?;
    validate_room(&input).map_err(ActionError::validation)?;
    let (name, location) = normalize(input);

    let existing = state
        .store
        .get_room(id)
        .action_err(ErrorCode::InternalError, "Failed to update room")?
        .or_code(ErrorCode::RoomNotFound, "Room not found")?;

    if name != existing.name {
        let taken = state
            .store
            .get_room_by_name(&name)
            .action_err(ErrorCode::InternalError, "Failed to update room")?;
        if taken.is_some_and(|r| r.id != id) {
            return Err(room_exists());
        }
    }

    state
        .store
        .update_room(&Room {
            id: id.to_string(),
            name,
            location,
        })
        .map_err(|e| map_room_write(e, "Failed to update room"))?;

    Ok(IdResponse { id: id.to_string() })
}

/// Deletes the room and, by cascade, its agendas. Their calendar events
/// are removed first on a best-effort basis.
pub async fn delete_room(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
) -> ActionResponse<SuccessResponse> {
    delete(state, session, id).await.into()
}

async fn delete(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
) -> Result<SuccessResponse, ActionError> {
    require_admin(session)?;

    state
        .store
        .get_room(id)
        .action_err(ErrorCode::InternalError, "Failed to delete room")?
        .or_code(ErrorCode::RoomNotFound, "Room not found")?;

    let agendas = state
        .store
        .list_room_agendas(id)
        .action_err(ErrorCode::InternalError, "Failed to delete room")?;
    if !agendas.is_empty() {
        warn!(room_id = %id, "Deleting room with {} agendas", agendas.len());
    }
    for agenda in &agendas {
        if let Err(e) = state.calendar.delete(agenda).await {
            warn!(agenda_id = %agenda.id, "Calendar event left behind: {}", e);
        }
    }

    let deleted = state
        .store
        .delete_room(id)
        .action_err(ErrorCode::InternalError, "Failed to delete room")?;
    if !deleted {
        return Err(ActionError::new(ErrorCode::RoomNotFound, "Room not found"));
    }

    info!(room_id = %id, "Deleted room");
    Ok(SuccessResponse { success: true })
}

pub fn list_rooms(state: &AppState) -> ActionResponse<Vec<Room>> {
    state
        .store
        .list_rooms()
        .action_err(ErrorCode::InternalError, "Failed to load rooms")
        .into()
}
