use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Agenda, Priority, Role};

/// Agenda form submitted for create and update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub priority: Priority,
    pub room_id: String,
    #[serde(default)]
    pub access_mahasiswa: bool,
    #[serde(default)]
    pub access_all_dosen: bool,
    /// Lecturer ids granted explicit access. On update, `None` leaves the
    /// existing grants untouched.
    #[serde(default)]
    pub access_dosen: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInput {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub name: String,
    pub email: String,
    /// Required on create; empty on update keeps the current password.
    #[serde(default)]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettingsInput {
    pub group_email: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkUserFailure {
    pub index: usize,
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateReport {
    pub success_count: usize,
    pub failed_users: Vec<BulkUserFailure>,
}

/// One page of a viewer's agenda listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaPage {
    pub agendas: Vec<Agenda>,
    pub total: i64,
}
