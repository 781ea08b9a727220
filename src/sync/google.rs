//! Google Calendar and Admin Directory clients over reqwest.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::provider::{CalendarEvent, CalendarProvider, GroupDirectory, ProviderError};

pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_DIRECTORY_API_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: String,
}

#[derive(Debug, Serialize)]
struct MemberBody<'a> {
    email: &'a str,
    role: &'a str,
}

fn path_segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Sends the request, turning transport failures and non-2xx answers into
/// a [`ProviderError`]. Google's `{"error": {"message"}}` body supplies the
/// message when present.
async fn send(request: RequestBuilder) -> Result<Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let message = serde_json::from_str::<GoogleErrorBody>(&error_text)
        .map(|body| body.error.message)
        .unwrap_or_else(|_| {
            if error_text.is_empty() {
                status.to_string()
            } else {
                error_text
            }
        });

    Err(ProviderError::http(status.as_u16(), message))
}

pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.base_url, path_segment(calendar_id))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<String, ProviderError> {
        let response = send(
            self.client
                .post(self.events_url(calendar_id))
                .bearer_auth(&self.access_token)
                .json(event),
        )
        .await?;

        let inserted: InsertedEvent = response.json().await.map_err(|e| {
            ProviderError::new(None, format!("Failed to parse inserted event: {}", e))
        })?;
        Ok(inserted.id)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/{}", self.events_url(calendar_id), path_segment(event_id));
        send(
            self.client
                .put(url)
                .bearer_auth(&self.access_token)
                .json(event),
        )
        .await?;
        Ok(())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ProviderError> {
        let url = format!("{}/{}", self.events_url(calendar_id), path_segment(event_id));
        send(self.client.delete(url).bearer_auth(&self.access_token)).await?;
        Ok(())
    }
}

pub struct GoogleDirectoryClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GoogleDirectoryClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn members_url(&self, group_email: &str) -> String {
        format!("{}/groups/{}/members", self.base_url, path_segment(group_email))
    }
}

#[async_trait]
impl GroupDirectory for GoogleDirectoryClient {
    async fn insert_member(&self, group_email: &str, email: &str) -> Result<(), ProviderError> {
        send(
            self.client
                .post(self.members_url(group_email))
                .bearer_auth(&self.access_token)
                .json(&MemberBody {
                    email,
                    role: "MEMBER",
                }),
        )
        .await?;
        Ok(())
    }

    async fn delete_member(&self, group_email: &str, email: &str) -> Result<(), ProviderError> {
        let url = format!("{}/{}", self.members_url(group_email), path_segment(email));
        send(self.client.delete(url).bearer_auth(&self.access_token)).await?;
        Ok(())
    }

    async fn get_member(&self, group_email: &str, email: &str) -> Result<(), ProviderError> {
        let url = format!("{}/{}", self.members_url(group_email), path_segment(email));
        send(self.client.get(url).bearer_auth(&self.access_token)).await?;
        Ok(())
    }
}
