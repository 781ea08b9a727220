use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use super::dto::{BulkCreateReport, BulkUserFailure, IdResponse, SuccessResponse, UserInput};
use super::response::{ActionError, ActionResponse, ErrorCode, StoreOptionExt, StoreResultExt};
use super::validation::validate_user;
use crate::auth::{Session, require_admin};
use crate::error::Error;
use crate::types::User;

const EMAIL_EXISTS: &str = "Email already registered";

fn email_exists() -> ActionError {
    ActionError::new(ErrorCode::EmailExists, EMAIL_EXISTS).with_field("email", EMAIL_EXISTS)
}

fn map_user_write(err: Error, message: &'static str) -> ActionError {
    match err {
        Error::AlreadyExists => email_exists(),
        Error::NotFound => ActionError::new(ErrorCode::UserNotFound, "User not found"),
        e => {
            error!("{}: {}", message, e);
            ActionError::internal(message)
        }
    }
}

fn image_of(input: &UserInput) -> Option<String> {
    input.image.clone().filter(|i| !i.is_empty())
}

/// Builds the stored user from a validated form.
fn new_user(state: &AppState, input: UserInput) -> Result<User, ActionError> {
    let password_hash = state.passwords.hash(&input.password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ActionError::internal("Failed to create user")
    })?;

    let now = Utc::now();
    Ok(User {
        id: Uuid::new_v4().to_string(),
        image: image_of(&input),
        name: input.name,
        email: Some(input.email.trim().to_string()),
        password_hash: Some(password_hash),
        role: input.role,
        created_at: now,
        updated_at: now,
    })
}

/// Creates the account and invites its address into the group. A failed
/// invite is logged for the retry sweep and does not fail the action.
pub async fn create_user(
    state: &AppState,
    session: Option<&Session>,
    input: UserInput,
) -> ActionResponse<IdResponse> {
    create(state, session, input).await.into()
}

async fn create(
    state: &AppState,
    session: Option<&Session>,
    input: UserInput,
) -> Result<IdResponse, ActionError> {
    require_admin(session)?;
    validate_user(&input, true).map_err(ActionError::validation)?;

    let existing = state
        .store
        .get_user_by_email(input.email.trim())
        .action_err(ErrorCode::InternalError, "Failed to create user")?;
    if existing.is_some() {
        return Err(email_exists());
    }

    let user = new_user(state, input)?;
    state
        .store
        .create_user(&user)
        .map_err(|e| map_user_write(e, "Failed to create user"))?;
    info!(user_id = %user.id, role = %user.role, "Created user");

    if let Err(e) = state.group.add(&user).await {
        warn!(user_id = %user.id, "Group invite deferred: {}", e);
    }

    Ok(IdResponse { id: user.id })
}

pub async fn update_user(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
    input: UserInput,
) -> ActionResponse<IdResponse> {
    update(state, session, id, input).await.into()
}

async fn update(
    state: &AppState,
    session: Option<&Session>,
    id: &str,
    input: UserInput,
) -> Result<IdResponse, ActionError> {
    require_admin(session)?;
    validate_user(&input, false).map_err(ActionError::validation)?;

    let existing = state
        .store
        .get_user(id)
        .action_err(ErrorCode::InternalError, "Failed to update user")?
        .or_code(ErrorCode::UserNotFound, "User not found")?;

    let email = input.email.trim().to_string();
    let taken = state
        .store
        .get_user_by_email(&email)
        .action_err(ErrorCode::InternalError, "Failed to update user")?;
    if taken.is_some_and(|u| u.id != id) {
        return Err(email_exists());
    }

    let password_hash = if input.password.is_empty() {
        existing.password_hash.clone()
    } else {
        let hash = state.passwords.hash(&input.password).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ActionError::internal("Failed to update user")
        })?;
        Some(hash)
    };

    let previous_email = existing.email.clone();
    let user = User {
        image: image_of(&input),
        name: input.name,
        email: Some(email.clone()),
        password_hash,
        role: input.role,
        updated_at: Utc::now(),
        ..existing
    };
    state
        .store
        .update_user(&user)
        .map_err(|e| map_user_write(e, "Failed to update user"))?;
    info!(user_id = %id, "Updated user");

    if previous_email.as_deref() != Some(email.as_str()) {
        if let Some(old) = previous_email.as_deref() {
            if let Err(e) = state.group.remove_address(&user, old).await {
                warn!(user_id = %id, "Failed to remove previous address from group: {}", e);
            }
        }
        if let Err(e) = state.group.add(&user).await {
            warn!(user_id = %id, "Group invite deferred: {}", e);
        }
    }

    Ok(IdResponse { id: id.to_string() })
}

/// Refuses users that still own agendas or hold grants.
pub async fn delete_user(
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

    let user = state
        .store
        .get_user(id)
        .action_err(ErrorCode::InternalError, "Failed to delete user")?
        .or_code(ErrorCode::UserNotFound, "User not found")?;

    let related = state
        .store
        .user_has_related_data(id)
        .action_err(ErrorCode::InternalError, "Failed to delete user")?;
    if related {
        return Err(ActionError::new(
            ErrorCode::UserHasRelatedData,
            "User still owns agendas or holds agenda access",
        ));
    }

    if user.email.is_some() {
        if let Err(e) = state.group.remove(&user).await {
            warn!(user_id = %id, "Failed to remove user from group: {}", e);
        }
    }

    let deleted = state
        .store
        .delete_user(id)
        .map_err(|e| map_user_write(e, "Failed to delete user"))?;
    if !deleted {
        return Err(ActionError::new(ErrorCode::UserNotFound, "User not found"));
    }

    info!(user_id = %id, "Deleted user");
    Ok(SuccessResponse { success: true })
}

/// Creates each row independently. `start_index` offsets the reported row
/// numbers when a large import is submitted in slices. Created users are
/// then invited to the group in paced batches.
pub async fn bulk_create_users(
    state: &AppState,
    session: Option<&Session>,
    inputs: Vec<UserInput>,
    start_index: usize,
) -> ActionResponse<BulkCreateReport> {
    bulk_create(state, session, inputs, start_index).await.into()
}

fn describe(error: &ActionError) -> String {
    match &error.field_errors {
        Some(fields) if error.code == ErrorCode::ValidationError => fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field}: {m}")))
            .collect::<Vec<_>>()
            .join("; "),
        _ => error.message.clone(),
    }
}

fn create_row(state: &AppState, input: UserInput) -> Result<User, ActionError> {
    validate_user(&input, true).map_err(ActionError::validation)?;

    let existing = state
        .store
        .get_user_by_email(input.email.trim())
        .action_err(ErrorCode::InternalError, "Failed to create user")?;
    if existing.is_some() {
        return Err(email_exists());
    }

    let user = new_user(state, input)?;
    state
        .store
        .create_user(&user)
        .map_err(|e| map_user_write(e, "Failed to create user"))?;
    Ok(user)
}

async fn bulk_create(
    state: &AppState,
    session: Option<&Session>,
    inputs: Vec<UserInput>,
    start_index: usize,
) -> Result<BulkCreateReport, ActionError> {
    require_admin(session)?;

    let mut report = BulkCreateReport::default();
    let mut created = Vec::new();

    for (i, input) in inputs.into_iter().enumerate() {
        let email = input.email.clone();
        match create_row(state, input) {
            Ok(user) => {
                report.success_count += 1;
                created.push(user);
            }
            Err(e) => report.failed_users.push(BulkUserFailure {
                index: start_index + i,
                email,
                error: describe(&e),
            }),
        }
    }

    info!(
        created = report.success_count,
        failed = report.failed_users.len(),
        "Bulk user import finished"
    );

    if !created.is_empty() {
        let invites = state.group.batch_add(&created).await;
        if !invites.failed_users.is_empty() {
            warn!(
                failed = invites.failed_users.len(),
                "Some group invites were deferred"
            );
        }
    }

    Ok(report)
}
