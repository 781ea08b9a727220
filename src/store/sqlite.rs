use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params,
    params_from_iter,
};

use super::schema::SCHEMA;
use super::{AgendaFilter, Store, Visibility};
use crate::error::{Error, Result};
use crate::types::*;

const AGENDA_COLUMNS: &str = "a.id, a.title, a.description, a.start_time, a.end_time, a.priority,
    a.room_id, a.created_by_id, a.access_mahasiswa, a.access_all_dosen, a.google_event_id,
    a.sync_status, a.sync_error, a.last_sync_attempt, a.created_at, a.updated_at";

const USER_COLUMNS: &str =
    "u.id, u.name, u.email, u.password_hash, u.image, u.role, u.created_at, u.updated_at";

const SYNC_LOG_COLUMNS: &str = "l.id, l.subject_id, l.operation, l.status, l.message, l.timestamp";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width UTC form so that text comparison in SQL orders correctly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_column<T>(idx: usize, raw: String, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{raw}'").into(),
        )
    })
}

fn map_unique_violation(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(ref msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("UNIQUE") =>
        {
            Error::AlreadyExists
        }
        e => Error::from(e),
    }
}

fn row_to_room(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        role: parse_column(5, row.get(5)?, Role::parse)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn row_to_agenda(row: &Row<'_>) -> rusqlite::Result<Agenda> {
    Ok(Agenda {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: parse_datetime(&row.get::<_, String>(3)?),
        end_time: parse_datetime(&row.get::<_, String>(4)?),
        priority: parse_column(5, row.get(5)?, Priority::parse)?,
        room_id: row.get(6)?,
        created_by_id: row.get(7)?,
        access_mahasiswa: row.get(8)?,
        access_all_dosen: row.get(9)?,
        google_event_id: row.get(10)?,
        sync_status: parse_column(11, row.get(11)?, SyncStatus::parse)?,
        sync_error: row.get(12)?,
        last_sync_attempt: row.get::<_, Option<String>>(13)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(14)?),
        updated_at: parse_datetime(&row.get::<_, String>(15)?),
    })
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        kind: parse_column(1, row.get(1)?, NotificationType::parse)?,
        message: row.get(2)?,
        read: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        agenda_id: row.get(5)?,
        user_id: row.get(6)?,
    })
}

fn row_to_sync_log(row: &Row<'_>) -> rusqlite::Result<SyncLog> {
    Ok(SyncLog {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        operation: parse_column(2, row.get(2)?, SyncOperation::parse)?,
        status: parse_column(3, row.get(3)?, SyncLogStatus::parse)?,
        message: row.get(4)?,
        timestamp: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Overlap test `NOT (start >= new_end OR end <= new_start)`; touching
/// endpoints do not conflict.
fn conflicting_in_tx(
    tx: &Transaction<'_>,
    room_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_agenda_id: Option<&str>,
) -> Result<Option<String>> {
    tx.query_row(
        "SELECT id FROM agendas
         WHERE room_id = ?1
           AND NOT (start_time >= ?3 OR end_time <= ?2)
           AND (?4 IS NULL OR id != ?4)
         ORDER BY start_time LIMIT 1",
        params![
            room_id,
            format_datetime(start),
            format_datetime(end),
            exclude_agenda_id
        ],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::from)
}

fn insert_access_in_tx(tx: &Transaction<'_>, agenda_id: &str, user_ids: &[String]) -> Result<()> {
    let now = format_datetime(&Utc::now());
    for user_id in user_ids {
        tx.execute(
            "INSERT OR IGNORE INTO agenda_access (agenda_id, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![agenda_id, user_id, now],
        )?;
    }
    Ok(())
}

/// Builds the WHERE clause for a viewer's agenda listing, pushing bound
/// values in placeholder order.
fn visibility_clause(visibility: &Visibility, filter: &AgendaFilter, values: &mut Vec<Value>) -> String {
    let mut clauses: Vec<String> = Vec::new();

    match visibility {
        Visibility::All => {}
        Visibility::Restricted { user_id, all_dosen } => {
            let mut any = vec![
                "a.created_by_id = ?".to_string(),
                "EXISTS (SELECT 1 FROM agenda_access x WHERE x.agenda_id = a.id AND x.user_id = ?)"
                    .to_string(),
            ];
            values.push(Value::Text(user_id.clone()));
            values.push(Value::Text(user_id.clone()));
            if *all_dosen {
                any.push("a.access_all_dosen = 1".to_string());
            }
            clauses.push(format!("({})", any.join(" OR ")));
        }
    }

    if let Some(start) = &filter.start_date {
        clauses.push("a.start_time >= ?".to_string());
        values.push(Value::Text(format_datetime(start)));
    }
    if let Some(end) = &filter.end_date {
        clauses.push("a.end_time <= ?".to_string());
        values.push(Value::Text(format_datetime(end)));
    }
    if let Some(room_id) = &filter.room_id {
        clauses.push("a.room_id = ?".to_string());
        values.push(Value::Text(room_id.clone()));
    }
    if let Some(priority) = filter.priority {
        clauses.push("a.priority = ?".to_string());
        values.push(Value::Text(priority.as_str().to_string()));
    }

    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Room operations

    fn create_room(&self, room: &Room) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO rooms (id, name, location) VALUES (?1, ?2, ?3)",
                params![room.id, room.name, room.location],
            )
            .map_err(map_unique_violation)?;
        Ok(())
    }

    fn get_room(&self, id: &str) -> Result<Option<Room>> {
        self.conn()
            .query_row(
                "SELECT id, name, location FROM rooms WHERE id = ?1",
                params![id],
                row_to_room,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_room_by_name(&self, name: &str) -> Result<Option<Room>> {
        self.conn()
            .query_row(
                "SELECT id, name, location FROM rooms WHERE name = ?1",
                params![name],
                row_to_room,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_rooms(&self) -> Result<Vec<Room>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, location FROM rooms ORDER BY name")?;
        let rows = stmt.query_map([], row_to_room)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_room(&self, room: &Room) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE rooms SET name = ?1, location = ?2 WHERE id = ?3",
                params![room.name, room.location, room.id],
            )
            .map_err(map_unique_violation)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_room(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM rooms WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, image, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.password_hash,
                    user.image,
                    user.role.as_str(),
                    format_datetime(&user.created_at),
                    format_datetime(&user.updated_at),
                ],
            )
            .map_err(map_unique_violation)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users_by_role(&self, role: Role) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.role = ?1 ORDER BY u.name, u.id"
        ))?;
        let rows = stmt.query_map(params![role.as_str()], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, image = ?4, role = ?5,
                 updated_at = ?6 WHERE id = ?7",
                params![
                    user.name,
                    user.email,
                    user.password_hash,
                    user.image,
                    user.role.as_str(),
                    format_datetime(&user.updated_at),
                    user.id,
                ],
            )
            .map_err(map_unique_violation)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn user_has_related_data(&self, id: &str) -> Result<bool> {
        let related: bool = self.conn().query_row(
            "SELECT EXISTS (SELECT 1 FROM agendas WHERE created_by_id = ?1)
                 OR EXISTS (SELECT 1 FROM agenda_access WHERE user_id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(related)
    }

    // Agenda operations

    fn find_conflicting_agenda(
        &self,
        room_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_agenda_id: Option<&str>,
    ) -> Result<Option<Agenda>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {AGENDA_COLUMNS} FROM agendas a
                     WHERE a.room_id = ?1
                       AND NOT (a.start_time >= ?3 OR a.end_time <= ?2)
                       AND (?4 IS NULL OR a.id != ?4)
                     ORDER BY a.start_time LIMIT 1"
                ),
                params![
                    room_id,
                    format_datetime(&start),
                    format_datetime(&end),
                    exclude_agenda_id
                ],
                row_to_agenda,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_busy_room_ids(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT room_id FROM agendas
             WHERE NOT (start_time >= ?2 OR end_time <= ?1)",
        )?;
        let rows = stmt.query_map(
            params![format_datetime(&start), format_datetime(&end)],
            |row| row.get(0),
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn insert_agenda_checked(&self, agenda: &Agenda, access_user_ids: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(other) = conflicting_in_tx(
            &tx,
            &agenda.room_id,
            &agenda.start_time,
            &agenda.end_time,
            None,
        )? {
            return Err(Error::Conflict(format!("room is occupied by agenda {other}")));
        }

        tx.execute(
            "INSERT INTO agendas (id, title, description, start_time, end_time, priority, room_id,
                 created_by_id, access_mahasiswa, access_all_dosen, google_event_id, sync_status,
                 sync_error, last_sync_attempt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                agenda.id,
                agenda.title,
                agenda.description,
                format_datetime(&agenda.start_time),
                format_datetime(&agenda.end_time),
                agenda.priority.as_str(),
                agenda.room_id,
                agenda.created_by_id,
                agenda.access_mahasiswa,
                agenda.access_all_dosen,
                agenda.google_event_id,
                agenda.sync_status.as_str(),
                agenda.sync_error,
                agenda.last_sync_attempt.as_ref().map(format_datetime),
                format_datetime(&agenda.created_at),
                format_datetime(&agenda.updated_at),
            ],
        )?;

        insert_access_in_tx(&tx, &agenda.id, access_user_ids)?;

        tx.commit()?;
        Ok(())
    }

    fn update_agenda_checked(&self, agenda: &Agenda) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(other) = conflicting_in_tx(
            &tx,
            &agenda.room_id,
            &agenda.start_time,
            &agenda.end_time,
            Some(&agenda.id),
        )? {
            return Err(Error::Conflict(format!("room is occupied by agenda {other}")));
        }

        let rows = tx.execute(
            "UPDATE agendas SET title = ?1, description = ?2, start_time = ?3, end_time = ?4,
                 priority = ?5, room_id = ?6, access_mahasiswa = ?7, access_all_dosen = ?8,
                 updated_at = ?9
             WHERE id = ?10",
            params![
                agenda.title,
                agenda.description,
                format_datetime(&agenda.start_time),
                format_datetime(&agenda.end_time),
                agenda.priority.as_str(),
                agenda.room_id,
                agenda.access_mahasiswa,
                agenda.access_all_dosen,
                format_datetime(&agenda.updated_at),
                agenda.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;
        Ok(())
    }

    fn get_agenda(&self, id: &str) -> Result<Option<Agenda>> {
        self.conn()
            .query_row(
                &format!("SELECT {AGENDA_COLUMNS} FROM agendas a WHERE a.id = ?1"),
                params![id],
                row_to_agenda,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_agenda_details(&self, id: &str) -> Result<Option<AgendaDetails>> {
        let Some(agenda) = self.get_agenda(id)? else {
            return Ok(None);
        };

        let room = self.get_room(&agenda.room_id)?.ok_or(Error::NotFound)?;

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u
             JOIN agenda_access x ON x.user_id = u.id
             WHERE x.agenda_id = ?1
             ORDER BY u.name, u.id"
        ))?;
        let access_dosen = stmt
            .query_map(params![id], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(AgendaDetails {
            agenda,
            room,
            access_dosen,
        }))
    }

    fn list_room_agendas(&self, room_id: &str) -> Result<Vec<Agenda>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AGENDA_COLUMNS} FROM agendas a WHERE a.room_id = ?1 ORDER BY a.start_time"
        ))?;
        let rows = stmt.query_map(params![room_id], row_to_agenda)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_visible_agendas(
        &self,
        visibility: &Visibility,
        filter: &AgendaFilter,
    ) -> Result<Vec<Agenda>> {
        let mut values = Vec::new();
        let where_clause = visibility_clause(visibility, filter, &mut values);
        values.push(Value::Integer(filter.limit()));
        values.push(Value::Integer(filter.offset()));

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AGENDA_COLUMNS} FROM agendas a {where_clause}
             ORDER BY a.start_time, a.id LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_agenda)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_visible_agendas(
        &self,
        visibility: &Visibility,
        filter: &AgendaFilter,
    ) -> Result<i64> {
        let mut values = Vec::new();
        let where_clause = visibility_clause(visibility, filter, &mut values);

        let count = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM agendas a {where_clause}"),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_agendas_by_sync_status(
        &self,
        statuses: &[SyncStatus],
        limit: i64,
    ) -> Result<Vec<Agenda>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<Value> = statuses
            .iter()
            .map(|s| Value::Text(s.as_str().to_string()))
            .collect();
        values.push(Value::Integer(limit));

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AGENDA_COLUMNS} FROM agendas a
             WHERE a.sync_status IN ({})
             ORDER BY a.last_sync_attempt ASC, a.id ASC
             LIMIT ?",
            placeholders(statuses.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_agenda)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn save_agenda_sync(&self, agenda: &Agenda) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE agendas SET google_event_id = ?1, sync_status = ?2, sync_error = ?3,
                 last_sync_attempt = ?4
             WHERE id = ?5",
            params![
                agenda.google_event_id,
                agenda.sync_status.as_str(),
                agenda.sync_error,
                agenda.last_sync_attempt.as_ref().map(format_datetime),
                agenda.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_agenda(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM agendas WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Agenda access operations

    fn list_agenda_access(&self, agenda_id: &str) -> Result<Vec<AgendaAccess>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT agenda_id, user_id, created_at FROM agenda_access
             WHERE agenda_id = ?1 ORDER BY user_id",
        )?;
        let rows = stmt.query_map(params![agenda_id], |row| {
            Ok(AgendaAccess {
                agenda_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: parse_datetime(&row.get::<_, String>(2)?),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn add_agenda_access(&self, agenda_id: &str, user_ids: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert_access_in_tx(&tx, agenda_id, user_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn remove_agenda_access(&self, agenda_id: &str, user_ids: &[String]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut removed = 0;
        for user_id in user_ids {
            removed += tx.execute(
                "DELETE FROM agenda_access WHERE agenda_id = ?1 AND user_id = ?2",
                params![agenda_id, user_id],
            )?;
        }

        tx.commit()?;
        Ok(removed)
    }

    fn clear_agenda_access(&self, agenda_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM agenda_access WHERE agenda_id = ?1",
            params![agenda_id],
        )?;
        Ok(rows)
    }

    // Notification operations

    fn insert_notifications(&self, notifications: &[Notification]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for n in notifications {
            tx.execute(
                "INSERT INTO notifications (id, type, message, read, created_at, agenda_id, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    n.id,
                    n.kind.as_str(),
                    n.message,
                    n.read,
                    format_datetime(&n.created_at),
                    n.agenda_id,
                    n.user_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_agenda_notifications(&self, agenda_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM notifications WHERE agenda_id = ?1",
            params![agenda_id],
        )?;
        Ok(rows)
    }

    fn list_user_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, type, message, read, created_at, agenda_id, user_id
             FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, id",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_notification)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Sync log operations

    fn append_sync_log(
        &self,
        subject_id: &str,
        operation: SyncOperation,
        status: SyncLogStatus,
        message: Option<&str>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sync_logs (subject_id, operation, status, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                subject_id,
                operation.as_str(),
                status.as_str(),
                message,
                format_datetime(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn list_sync_logs(&self, subject_id: &str) -> Result<Vec<SyncLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYNC_LOG_COLUMNS} FROM sync_logs l WHERE l.subject_id = ?1 ORDER BY l.id"
        ))?;
        let rows = stmt.query_map(params![subject_id], row_to_sync_log)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_unresolved_failures(
        &self,
        operations: &[SyncOperation],
        limit: i64,
    ) -> Result<Vec<SyncLog>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let ops = placeholders(operations.len());
        let op_values = operations
            .iter()
            .map(|op| Value::Text(op.as_str().to_string()));

        // Three IN lists, then the limit.
        let mut values: Vec<Value> = Vec::new();
        for _ in 0..3 {
            values.extend(op_values.clone());
        }
        values.push(Value::Integer(limit));

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYNC_LOG_COLUMNS} FROM sync_logs l
             WHERE l.operation IN ({ops}) AND l.status = 'FAILED'
               AND EXISTS (
                   SELECT 1 FROM users u WHERE u.id = l.subject_id AND u.email IS NOT NULL
               )
               AND l.id = (
                   SELECT MIN(f.id) FROM sync_logs f
                   WHERE f.subject_id = l.subject_id
                     AND f.operation IN ({ops}) AND f.status = 'FAILED'
                     AND f.id > COALESCE((
                         SELECT MAX(s.id) FROM sync_logs s
                         WHERE s.subject_id = l.subject_id
                           AND s.operation IN ({ops})
                           AND s.status IN ('SUCCESS', 'ALREADY_EXISTS')
                     ), 0)
               )
             ORDER BY l.timestamp ASC, l.id ASC
             LIMIT ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_sync_log)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Settings singletons

    fn get_calendar_shareable(&self) -> Result<Option<CalendarShareable>> {
        self.conn()
            .query_row(
                "SELECT calendar_id FROM calendar_shareable WHERE singleton = 1",
                [],
                |row| {
                    Ok(CalendarShareable {
                        calendar_id: row.get(0)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn set_calendar_shareable(&self, calendar: &CalendarShareable) -> Result<()> {
        self.conn().execute(
            "INSERT INTO calendar_shareable (singleton, calendar_id) VALUES (1, ?1)
             ON CONFLICT(singleton) DO UPDATE SET calendar_id = excluded.calendar_id",
            params![calendar.calendar_id],
        )?;
        Ok(())
    }

    fn get_group_shareable(&self) -> Result<Option<GroupShareable>> {
        self.conn()
            .query_row(
                "SELECT group_email, group_name, description FROM group_shareable
                 WHERE singleton = 1",
                [],
                |row| {
                    Ok(GroupShareable {
                        group_email: row.get(0)?,
                        group_name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn set_group_shareable(&self, group: &GroupShareable) -> Result<()> {
        self.conn().execute(
            "INSERT INTO group_shareable (singleton, group_email, group_name, description)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(singleton) DO UPDATE SET
                 group_email = excluded.group_email,
                 group_name = COALESCE(excluded.group_name, group_shareable.group_name),
                 description = COALESCE(excluded.description, group_shareable.description)",
            params![group.group_email, group.group_name, group.description],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn setup() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn user(id: &str, email: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            email: Some(email.to_string()),
            password_hash: None,
            image: None,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn agenda(id: &str, room_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Agenda {
        Agenda {
            id: id.to_string(),
            title: format!("Agenda {id}"),
            description: None,
            start_time: start,
            end_time: end,
            priority: Priority::Medium,
            room_id: room_id.to_string(),
            created_by_id: "admin".to_string(),
            access_mahasiswa: false,
            access_all_dosen: false,
            google_event_id: None,
            sync_status: SyncStatus::Pending,
            sync_error: None,
            last_sync_attempt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn seed(store: &SqliteStore) {
        store
            .create_user(&user("admin", "admin@example.ac.id", Role::Admin))
            .unwrap();
        store
            .create_room(&Room {
                id: "r1".to_string(),
                name: "Boardroom".to_string(),
                location: None,
            })
            .unwrap();
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = setup();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "agenda_access",
            "agendas",
            "calendar_shareable",
            "group_shareable",
            "notifications",
            "rooms",
            "sync_logs",
            "users",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_duplicate_room_name_is_already_exists() {
        let (_temp, store) = setup();
        seed(&store);

        let err = store
            .create_room(&Room {
                id: "r2".to_string(),
                name: "Boardroom".to_string(),
                location: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists));
    }

    #[test]
    fn test_checked_insert_rejects_overlap_but_allows_touching() {
        let (_temp, store) = setup();
        seed(&store);

        store
            .insert_agenda_checked(&agenda("a1", "r1", at(10, 0), at(11, 0)), &[])
            .unwrap();

        let err = store
            .insert_agenda_checked(&agenda("a2", "r1", at(10, 30), at(11, 30)), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(store.get_agenda("a2").unwrap().is_none());

        store
            .insert_agenda_checked(&agenda("a3", "r1", at(11, 0), at(12, 0)), &[])
            .unwrap();
    }

    #[test]
    fn test_checked_update_excludes_itself() {
        let (_temp, store) = setup();
        seed(&store);

        let mut a = agenda("a1", "r1", at(10, 0), at(11, 0));
        store.insert_agenda_checked(&a, &[]).unwrap();

        a.end_time = at(11, 30);
        store.update_agenda_checked(&a).unwrap();
        assert_eq!(store.get_agenda("a1").unwrap().unwrap().end_time, at(11, 30));
    }

    #[test]
    fn test_room_delete_cascades_agendas_and_access() {
        let (_temp, store) = setup();
        seed(&store);
        store
            .create_user(&user("d1", "d1@example.ac.id", Role::Dosen))
            .unwrap();
        store
            .insert_agenda_checked(
                &agenda("a1", "r1", at(10, 0), at(11, 0)),
                &["d1".to_string()],
            )
            .unwrap();

        assert!(store.delete_room("r1").unwrap());
        assert!(store.get_agenda("a1").unwrap().is_none());
        assert!(store.list_agenda_access("a1").unwrap().is_empty());
        assert!(!store.user_has_related_data("d1").unwrap());
    }

    #[test]
    fn test_user_with_grant_cannot_be_deleted() {
        let (_temp, store) = setup();
        seed(&store);
        store
            .create_user(&user("d1", "d1@example.ac.id", Role::Dosen))
            .unwrap();
        store
            .insert_agenda_checked(
                &agenda("a1", "r1", at(10, 0), at(11, 0)),
                &["d1".to_string()],
            )
            .unwrap();

        assert!(store.user_has_related_data("d1").unwrap());
        assert!(store.delete_user("d1").is_err());
    }

    #[test]
    fn test_sync_status_listing_oldest_attempt_first() {
        let (_temp, store) = setup();
        seed(&store);

        let mut newer = agenda("a1", "r1", at(8, 0), at(9, 0));
        newer.sync_status = SyncStatus::Failed;
        newer.last_sync_attempt = Some(at(12, 0));
        let mut older = agenda("a2", "r1", at(9, 0), at(10, 0));
        older.sync_status = SyncStatus::DeleteFailed;
        older.last_sync_attempt = Some(at(6, 0));
        let mut synced = agenda("a3", "r1", at(10, 0), at(11, 0));
        synced.sync_status = SyncStatus::Synced;

        for a in [&newer, &older, &synced] {
            store.insert_agenda_checked(a, &[]).unwrap();
        }

        let ids: Vec<String> = store
            .list_agendas_by_sync_status(&SyncStatus::RETRYABLE, 10)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a2", "a1"]);
    }

    #[test]
    fn test_unresolved_failures_skip_later_success() {
        let (_temp, store) = setup();
        for id in ["u1", "u2", "u3"] {
            store
                .create_user(&user(id, &format!("{id}@example.ac.id"), Role::Dosen))
                .unwrap();
        }

        store
            .append_sync_log("u1", SyncOperation::AddToGroup, SyncLogStatus::Failed, None)
            .unwrap();
        store
            .append_sync_log("u1", SyncOperation::AddToGroup, SyncLogStatus::Success, None)
            .unwrap();
        store
            .append_sync_log("u2", SyncOperation::BatchAddToGroup, SyncLogStatus::Failed, None)
            .unwrap();
        store
            .append_sync_log("u2", SyncOperation::BatchAddToGroup, SyncLogStatus::Failed, None)
            .unwrap();
        store
            .append_sync_log("u3", SyncOperation::RemoveFromGroup, SyncLogStatus::Failed, None)
            .unwrap();
        store
            .append_sync_log("gone", SyncOperation::AddToGroup, SyncLogStatus::Failed, None)
            .unwrap();

        let failures = store
            .list_unresolved_failures(&SyncOperation::GROUP_ADDS, 10)
            .unwrap();
        let subjects: Vec<&str> = failures.iter().map(|l| l.subject_id.as_str()).collect();
        assert_eq!(subjects, vec!["u2"]);
    }

    #[test]
    fn test_settings_singletons_upsert() {
        let (_temp, store) = setup();
        assert!(store.get_calendar_shareable().unwrap().is_none());

        store
            .set_calendar_shareable(&CalendarShareable {
                calendar_id: "first@group.calendar.google.com".to_string(),
            })
            .unwrap();
        store
            .set_calendar_shareable(&CalendarShareable {
                calendar_id: "second@group.calendar.google.com".to_string(),
            })
            .unwrap();

        assert_eq!(
            store.get_calendar_shareable().unwrap().unwrap().calendar_id,
            "second@group.calendar.google.com"
        );
    }
}
