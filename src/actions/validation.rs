use super::dto::{AgendaInput, RoomInput, UserInput};
use super::response::FieldErrors;

const MIN_TITLE_LEN: usize = 3;
const MAX_USER_NAME_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 8;

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// `local@domain.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn is_http_url(url: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

pub fn validate_agenda(input: &AgendaInput) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if input.title.trim().chars().count() < MIN_TITLE_LEN {
        push(
            &mut errors,
            "title",
            format!("Title must be at least {MIN_TITLE_LEN} characters"),
        );
    }
    if input.room_id.trim().is_empty() {
        push(&mut errors, "roomId", "Please choose a room");
    }
    if input.end_time <= input.start_time {
        push(&mut errors, "endTime", "End time must be after start time");
    }

    finish(errors)
}

pub fn validate_room(input: &RoomInput) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if input.name.trim().is_empty() {
        push(&mut errors, "name", "Room name is required");
    }
    finish(errors)
}

/// `require_password` is set on create. On update an empty password keeps
/// the stored one.
pub fn validate_user(input: &UserInput, require_password: bool) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    let name_len = input.name.chars().count();
    if name_len == 0 {
        push(&mut errors, "name", "Name is required");
    } else if name_len > MAX_USER_NAME_LEN {
        push(&mut errors, "name", "Name is too long");
    }

    if !is_valid_email(&input.email) {
        push(&mut errors, "email", "Invalid email");
    }

    if (require_password || !input.password.is_empty())
        && input.password.chars().count() < MIN_PASSWORD_LEN
    {
        push(
            &mut errors,
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }

    if let Some(image) = input.image.as_deref().filter(|i| !i.is_empty()) {
        if !is_http_url(image) {
            push(&mut errors, "image", "Invalid image URL");
        }
    }

    finish(errors)
}
