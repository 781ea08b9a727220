use chrono::{DateTime, Utc};

use crate::types::{Priority, Role, User};

pub const DEFAULT_AGENDA_LIMIT: i64 = 50;

/// Which agendas a viewer may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// No restriction (administrators).
    All,
    /// Agendas the user created, agendas with an explicit grant naming them,
    /// and agendas open to all lecturers when `all_dosen` is set.
    Restricted { user_id: String, all_dosen: bool },
}

impl Visibility {
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        match user.role {
            Role::Admin => Self::All,
            Role::Dosen => Self::Restricted {
                user_id: user.id.clone(),
                all_dosen: true,
            },
        }
    }
}

/// Optional narrowing applied on top of a [`Visibility`].
#[derive(Debug, Clone, Default)]
pub struct AgendaFilter {
    /// Agendas starting at or after this instant.
    pub start_date: Option<DateTime<Utc>>,
    /// Agendas ending at or before this instant.
    pub end_date: Option<DateTime<Utc>>,
    pub room_id: Option<String>,
    pub priority: Option<Priority>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AgendaFilter {
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_AGENDA_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}
