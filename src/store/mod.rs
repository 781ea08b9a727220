mod query;
mod schema;
mod sqlite;

pub use query::{AgendaFilter, DEFAULT_AGENDA_LIMIT, Visibility};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Agendas are written through the `*_checked` methods, which run the room
/// overlap check and the write in one transaction and fail with
/// [`crate::error::Error::Conflict`] when another agenda occupies the room.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Room operations
    fn create_room(&self, room: &Room) -> Result<()>;
    fn get_room(&self, id: &str) -> Result<Option<Room>>;
    fn get_room_by_name(&self, name: &str) -> Result<Option<Room>>;
    fn list_rooms(&self) -> Result<Vec<Room>>;
    fn update_room(&self, room: &Room) -> Result<()>;
    fn delete_room(&self, id: &str) -> Result<bool>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users_by_role(&self, role: Role) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;
    /// True when the user created an agenda or holds an access grant.
    fn user_has_related_data(&self, id: &str) -> Result<bool>;

    // Agenda operations
    fn find_conflicting_agenda(
        &self,
        room_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_agenda_id: Option<&str>,
    ) -> Result<Option<Agenda>>;
    fn list_busy_room_ids(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>>;
    fn insert_agenda_checked(&self, agenda: &Agenda, access_user_ids: &[String]) -> Result<()>;
    fn update_agenda_checked(&self, agenda: &Agenda) -> Result<()>;
    fn get_agenda(&self, id: &str) -> Result<Option<Agenda>>;
    fn get_agenda_details(&self, id: &str) -> Result<Option<AgendaDetails>>;
    fn list_room_agendas(&self, room_id: &str) -> Result<Vec<Agenda>>;
    fn list_visible_agendas(
        &self,
        visibility: &Visibility,
        filter: &AgendaFilter,
    ) -> Result<Vec<Agenda>>;
    fn count_visible_agendas(&self, visibility: &Visibility, filter: &AgendaFilter)
    -> Result<i64>;
    /// Oldest `last_sync_attempt` first.
    fn list_agendas_by_sync_status(
        &self,
        statuses: &[SyncStatus],
        limit: i64,
    ) -> Result<Vec<Agenda>>;
    /// Persists only the calendar mirror fields of the agenda.
    fn save_agenda_sync(&self, agenda: &Agenda) -> Result<()>;
    fn delete_agenda(&self, id: &str) -> Result<bool>;

    // Agenda access operations
    fn list_agenda_access(&self, agenda_id: &str) -> Result<Vec<AgendaAccess>>;
    fn add_agenda_access(&self, agenda_id: &str, user_ids: &[String]) -> Result<()>;
    fn remove_agenda_access(&self, agenda_id: &str, user_ids: &[String]) -> Result<usize>;
    fn clear_agenda_access(&self, agenda_id: &str) -> Result<usize>;

    // Notification operations
    fn insert_notifications(&self, notifications: &[Notification]) -> Result<()>;
    fn delete_agenda_notifications(&self, agenda_id: &str) -> Result<usize>;
    fn list_user_notifications(&self, user_id: &str) -> Result<Vec<Notification>>;

    // Sync log operations (append-only)
    fn append_sync_log(
        &self,
        subject_id: &str,
        operation: SyncOperation,
        status: SyncLogStatus,
        message: Option<&str>,
    ) -> Result<()>;
    fn list_sync_logs(&self, subject_id: &str) -> Result<Vec<SyncLog>>;
    /// Oldest failed entry per user among `operations`, skipping users with
    /// a later successful entry for the same operations and users that no
    /// longer exist or have no email.
    fn list_unresolved_failures(
        &self,
        operations: &[SyncOperation],
        limit: i64,
    ) -> Result<Vec<SyncLog>>;

    // Settings singletons
    fn get_calendar_shareable(&self) -> Result<Option<CalendarShareable>>;
    fn set_calendar_shareable(&self, calendar: &CalendarShareable) -> Result<()>;
    fn get_group_shareable(&self) -> Result<Option<GroupShareable>>;
    fn set_group_shareable(&self, group: &GroupShareable) -> Result<()>;
}
