use tracing::info;

use super::AppState;
use super::dto::GroupSettingsInput;
use super::response::{ActionError, ActionResponse, ErrorCode, StoreResultExt};
use super::validation::is_valid_email;
use crate::auth::{Session, require_admin};
use crate::types::{CalendarShareable, GroupShareable};

/// Stores the calendar every agenda is mirrored into.
pub fn save_calendar_id(
    state: &AppState,
    session: Option<&Session>,
    calendar_id: &str,
) -> ActionResponse<CalendarShareable> {
    save_calendar(state, session, calendar_id).into()
}

fn save_calendar(
    state: &AppState,
    session: Option<&Session>,
    calendar_id: &str,
) -> Result<CalendarShareable, ActionError> {
    require_admin(session)?;

    let calendar_id = calendar_id.trim();
    if calendar_id.is_empty() {
        return Err(ActionError::validation(Default::default())
            .with_field("calendarId", "Calendar id is required"));
    }

    let calendar = CalendarShareable {
        calendar_id: calendar_id.to_string(),
    };
    state
        .store
        .set_calendar_shareable(&calendar)
        .action_err(ErrorCode::InternalError, "Failed to save calendar")?;

    info!(calendar_id, "Saved calendar setting");
    Ok(calendar)
}

/// Stores the group that users are mirrored into.
pub fn save_group_email(
    state: &AppState,
    session: Option<&Session>,
    input: GroupSettingsInput,
) -> ActionResponse<GroupShareable> {
    save_group(state, session, input).into()
}

fn save_group(
    state: &AppState,
    session: Option<&Session>,
    input: GroupSettingsInput,
) -> Result<GroupShareable, ActionError> {
    require_admin(session)?;

    let group_email = input.group_email.trim().to_string();
    if !is_valid_email(&group_email) {
        return Err(ActionError::validation(Default::default())
            .with_field("groupEmail", "Invalid group email"));
    }

    let group = GroupShareable {
        group_email,
        group_name: input.group_name,
        description: input.description,
    };
    state
        .store
        .set_group_shareable(&group)
        .action_err(ErrorCode::InternalError, "Failed to save group")?;

    info!(group_email = %group.group_email, "Saved group setting");
    Ok(group)
}
