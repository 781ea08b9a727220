#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use fems::actions::AppState;
use fems::actions::dto::AgendaInput;
use fems::auth::Session;
use fems::config::{AppConfig, GroupConfig, NotifyConfig, RetryConfig};
use fems::store::{SqliteStore, Store};
use fems::sync::{CalendarEvent, CalendarProvider, GroupDirectory, ProviderError};
use fems::types::{CalendarShareable, GroupShareable, Priority, Role, Room, User};

pub const CALENDAR_ID: &str = "faculty@group.calendar.google.com";
pub const GROUP_EMAIL: &str = "staff@fems.test";

#[derive(Debug, Clone, PartialEq)]
pub enum CalendarCall {
    Insert {
        calendar_id: String,
        event: CalendarEvent,
    },
    Update {
        event_id: String,
        event: CalendarEvent,
    },
    Delete {
        event_id: String,
    },
}

/// In-memory calendar. Scripted failures are consumed one per call, in
/// order, before calls start succeeding.
#[derive(Default)]
pub struct FakeCalendar {
    calls: Mutex<Vec<CalendarCall>>,
    failures: Mutex<VecDeque<ProviderError>>,
    next_id: AtomicUsize,
}

impl FakeCalendar {
    pub fn fail_next(&self, status: u16, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push_back(ProviderError::http(status, message));
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CalendarCall::Delete { .. }))
            .count()
    }

    pub fn inserts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CalendarCall::Insert { .. }))
            .count()
    }

    fn record(&self, call: CalendarCall) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<String, ProviderError> {
        self.record(CalendarCall::Insert {
            calendar_id: calendar_id.to_string(),
            event: event.clone(),
        })?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("evt-{n}"))
    }

    async fn update_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<(), ProviderError> {
        self.record(CalendarCall::Update {
            event_id: event_id.to_string(),
            event: event.clone(),
        })
    }

    async fn delete_event(&self, _calendar_id: &str, event_id: &str) -> Result<(), ProviderError> {
        self.record(CalendarCall::Delete {
            event_id: event_id.to_string(),
        })
    }
}

/// In-memory group. Answers 409 for an existing member and 404 for an
/// absent one, unless a scripted failure is queued.
#[derive(Default)]
pub struct FakeDirectory {
    members: Mutex<BTreeSet<String>>,
    failures: Mutex<VecDeque<ProviderError>>,
    requests: AtomicUsize,
}

impl FakeDirectory {
    pub fn fail_next(&self, status: u16, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push_back(ProviderError::http(status, message));
    }

    pub fn add_existing(&self, email: &str) {
        self.members.lock().unwrap().insert(email.to_string());
    }

    pub fn members(&self) -> BTreeSet<String> {
        self.members.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn scripted(&self) -> Result<(), ProviderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GroupDirectory for FakeDirectory {
    async fn insert_member(&self, _group_email: &str, email: &str) -> Result<(), ProviderError> {
        self.scripted()?;
        if !self.members.lock().unwrap().insert(email.to_string()) {
            return Err(ProviderError::http(409, "Member already exists."));
        }
        Ok(())
    }

    async fn delete_member(&self, _group_email: &str, email: &str) -> Result<(), ProviderError> {
        self.scripted()?;
        if !self.members.lock().unwrap().remove(email) {
            return Err(ProviderError::http(404, "Resource Not Found: memberKey"));
        }
        Ok(())
    }

    async fn get_member(&self, _group_email: &str, email: &str) -> Result<(), ProviderError> {
        self.scripted()?;
        if !self.members.lock().unwrap().contains(email) {
            return Err(ProviderError::http(404, "Resource Not Found: memberKey"));
        }
        Ok(())
    }
}

/// Retries and pacing shrunk so failure paths finish quickly. Small
/// notification chunks so fan-out spans several inserts.
pub fn test_config(data_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        data_dir: data_dir.to_path_buf(),
        retry: RetryConfig {
            max_retries: 2,
            initial_delay_ms: 1,
        },
        group: GroupConfig {
            batch_size: 2,
            request_delay_ms: 0,
            batch_delay_ms: 0,
        },
        notify: NotifyConfig { batch_size: 2 },
        ..AppConfig::default()
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub calendar: Arc<FakeCalendar>,
    pub directory: Arc<FakeDirectory>,
    pub state: AppState,
    pub admin: Session,
}

impl TestContext {
    /// A fresh database with an administrator and both shareable settings.
    pub fn new() -> Self {
        let ctx = Self::unconfigured();
        ctx.store
            .set_calendar_shareable(&CalendarShareable {
                calendar_id: CALENDAR_ID.to_string(),
            })
            .expect("save calendar");
        ctx.store
            .set_group_shareable(&GroupShareable {
                group_email: GROUP_EMAIL.to_string(),
                group_name: Some("Faculty Staff".to_string()),
                description: None,
            })
            .expect("save group");
        ctx
    }

    /// No calendar or group has been chosen yet.
    pub fn unconfigured() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = test_config(temp_dir.path());

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");

        let calendar = Arc::new(FakeCalendar::default());
        let directory = Arc::new(FakeDirectory::default());
        let state = AppState::new(
            store.clone(),
            calendar.clone(),
            directory.clone(),
            &config,
        )
        .expect("build state");

        let ctx = Self {
            temp_dir,
            store,
            calendar,
            directory,
            state,
            admin: Session::new("pending", Role::Admin),
        };
        let admin = ctx.add_user("Admin", Some("admin@fems.test"), Role::Admin);
        Self {
            admin: Session::for_user(&admin),
            ..ctx
        }
    }

    pub fn add_room(&self, name: &str) -> Room {
        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            location: None,
        };
        self.store.create_room(&room).expect("create room");
        room
    }

    pub fn add_user(&self, name: &str, email: Option<&str>, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.map(str::to_string),
            password_hash: None,
            image: None,
            role,
            created_at: now,
            updated_at: now,
        };
        self.store.create_user(&user).expect("create user");
        user
    }

    pub fn lecturer(&self, name: &str) -> User {
        let email = format!("{}@fems.test", name.to_lowercase().replace(' ', "."));
        self.add_user(name, Some(&email), Role::Dosen)
    }

    pub fn session(&self) -> Option<&Session> {
        Some(&self.admin)
    }

    /// A second connection to the same database, for corrupting rows the
    /// store itself would never write.
    pub fn raw_connection(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(self.temp_dir.path().join("fems.db")).expect("open database")
    }

    pub fn access_ids(&self, agenda_id: &str) -> BTreeSet<String> {
        self.store
            .list_agenda_access(agenda_id)
            .expect("list access")
            .into_iter()
            .map(|a| a.user_id)
            .collect()
    }
}

/// 2 March 2026 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

pub fn agenda_input(
    title: &str,
    room: &Room,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AgendaInput {
    AgendaInput {
        title: title.to_string(),
        description: None,
        start_time: start,
        end_time: end,
        priority: Priority::Medium,
        room_id: room.id.clone(),
        access_mahasiswa: false,
        access_all_dosen: true,
        access_dosen: None,
    }
}
