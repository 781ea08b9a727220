use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by an external provider. `status` is the HTTP status
/// when the provider answered, `None` for transport or local failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status == Some(409)
    }

    /// Rate limits and server errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, Some(s) if s == 429 || s >= 500)
    }
}

impl From<crate::error::Error> for ProviderError {
    fn from(err: crate::error::Error) -> Self {
        Self::new(None, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateProperties {
    #[serde(rename = "agendaId")]
    pub agenda_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    pub private: PrivateProperties,
}

/// Calendar event body sent on insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub color_id: String,
    pub attendees: Vec<EventAttendee>,
    pub extended_properties: ExtendedProperties,
}

/// Calendar provider contract. Implementations report failures with the
/// HTTP status so the engine can classify them.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Returns the provider's event id.
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<String, ProviderError>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<(), ProviderError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ProviderError>;
}

/// Group directory contract. Members are keyed by email.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// 409 when the address is already a member.
    async fn insert_member(&self, group_email: &str, email: &str) -> Result<(), ProviderError>;

    /// 404 when the address is not a member.
    async fn delete_member(&self, group_email: &str, email: &str) -> Result<(), ProviderError>;

    /// 404 when the address is not a member.
    async fn get_member(&self, group_email: &str, email: &str) -> Result<(), ProviderError>;
}
