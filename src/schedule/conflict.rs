use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::store::Store;
use crate::types::Room;

/// Whether `[a_start, a_end)` and `[b_start, b_end)` overlap. Intervals that
/// only touch at an endpoint do not.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    !(a_start >= b_end || a_end <= b_start)
}

/// Room double-booking checks against stored agendas.
#[derive(Clone)]
pub struct ConflictDetector {
    store: Arc<dyn Store>,
}

impl ConflictDetector {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// True when another agenda in the room overlaps `[start, end)`.
    /// `exclude_agenda_id` names the agenda being edited.
    pub fn has_conflict(
        &self,
        room_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_agenda_id: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .store
            .find_conflicting_agenda(room_id, start, end, exclude_agenda_id)?
            .is_some())
    }

    /// Rooms with no agenda overlapping `[start, end)`, by name.
    pub fn available_rooms(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Room>> {
        let busy: HashSet<String> = self.store.list_busy_room_ids(start, end)?.into_iter().collect();

        Ok(self
            .store
            .list_rooms()?
            .into_iter()
            .filter(|room| !busy.contains(&room.id))
            .collect())
    }
}
