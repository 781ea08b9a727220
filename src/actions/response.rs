use std::collections::BTreeMap;

use serde::Serialize;
use tracing::error;

use crate::auth::AccessDenied;
use crate::error::Result as StoreResult;

/// Field name to its messages, in the order they were found.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    ValidationError,
    Conflict,
    NotFound,
    Forbidden,
    ServerError,
    EmailExists,
    RoomExists,
    RoomNotFound,
    UserNotFound,
    UserHasRelatedData,
    InternalError,
}

/// Error half of the `{data}` / `{error}` contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionError {
    pub message: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl ActionError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            field_errors: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: &str, message: impl Into<String>) -> Self {
        self.field_errors
            .get_or_insert_with(FieldErrors::new)
            .entry(field.to_string())
            .or_default()
            .push(message.into());
        self
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Unauthorized access")
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    #[must_use]
    pub fn validation(field_errors: FieldErrors) -> Self {
        Self {
            message: "Validation failed".to_string(),
            code: ErrorCode::ValidationError,
            field_errors: Some(field_errors),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<AccessDenied> for ActionError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => Self::unauthorized(),
            AccessDenied::NotAdmin => Self::forbidden("Administrator access required"),
        }
    }
}

/// `{data}` on success, `{error}` otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl<T: Serialize> ActionResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: ActionError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The error code, when the action failed.
    pub fn code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    pub fn into_result(self) -> Result<T, ActionError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(ActionError::internal("Empty response")),
        }
    }
}

impl<T: Serialize> From<Result<T, ActionError>> for ActionResponse<T> {
    fn from(result: Result<T, ActionError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(error) => Self::failure(error),
        }
    }
}

/// Extension trait for converting store results to action errors with a custom message.
pub trait StoreResultExt<T> {
    fn action_err(self, code: ErrorCode, message: &'static str) -> Result<T, ActionError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn action_err(self, code: ErrorCode, message: &'static str) -> Result<T, ActionError> {
        self.map_err(|e| {
            error!("{}: {}", message, e);
            ActionError::new(code, message)
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_code(self, code: ErrorCode, message: &'static str) -> Result<T, ActionError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_code(self, code: ErrorCode, message: &'static str) -> Result<T, ActionError> {
        self.ok_or_else(|| ActionError::new(code, message))
    }
}
