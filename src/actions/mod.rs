//! Admin-facing operations. Every action returns an [`ActionResponse`]
//! rather than an error, so a presentation layer can render the outcome
//! directly.

mod agenda;
pub mod dto;
pub mod response;
mod room;
mod settings;
mod user;
pub mod validation;

use std::sync::Arc;

pub use agenda::{
    available_rooms, create_agenda, delete_agenda, get_agenda, list_visible_agendas, update_agenda,
};
pub use response::{ActionError, ActionResponse, ErrorCode, FieldErrors};
pub use room::{create_room, delete_room, list_rooms, update_room};
pub use settings::{save_calendar_id, save_group_email};
pub use user::{bulk_create_users, create_user, delete_user, update_user};

use crate::auth::PasswordHashing;
use crate::config::AppConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::schedule::{AccessResolver, ConflictDetector};
use crate::store::Store;
use crate::sync::{CalendarProvider, CalendarSync, GroupDirectory, GroupSync};

/// Everything an action needs, wired once at startup.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub calendar: CalendarSync,
    pub group: GroupSync,
    pub notifier: Notifier,
    pub access: AccessResolver,
    pub conflicts: ConflictDetector,
    pub passwords: PasswordHashing,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        calendar_provider: Arc<dyn CalendarProvider>,
        directory: Arc<dyn GroupDirectory>,
        config: &AppConfig,
    ) -> Result<Self> {
        let tz = config.tz()?;

        Ok(Self {
            calendar: CalendarSync::new(
                store.clone(),
                calendar_provider,
                config.retry_policy(),
                tz,
            ),
            group: GroupSync::new(
                store.clone(),
                directory,
                config.retry_policy(),
                config.group_pacing(),
            ),
            notifier: Notifier::new(store.clone(), config.notify.batch_size, tz),
            access: AccessResolver::new(store.clone()),
            conflicts: ConflictDetector::new(store.clone()),
            passwords: PasswordHashing::new(),
            store,
        })
    }
}
