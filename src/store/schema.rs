pub const SCHEMA: &str = r#"
-- Rooms; deleting a room deletes its agendas
CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    location TEXT
);

-- Users (ADMIN or DOSEN); students are not modeled here
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE,
    password_hash TEXT,           -- NULL for external-auth-only accounts
    image TEXT,
    role TEXT NOT NULL DEFAULT 'DOSEN',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Agendas; a creator cannot be deleted while their agendas exist
CREATE TABLE IF NOT EXISTS agendas (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    priority TEXT NOT NULL,
    room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    created_by_id TEXT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
    access_mahasiswa INTEGER NOT NULL DEFAULT 0,
    access_all_dosen INTEGER NOT NULL DEFAULT 0,

    -- Calendar mirror
    google_event_id TEXT,
    sync_status TEXT NOT NULL DEFAULT 'PENDING',
    sync_error TEXT,
    last_sync_attempt TEXT,

    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    CHECK (end_time > start_time)
);

-- Explicit per-lecturer grants
CREATE TABLE IF NOT EXISTS agenda_access (
    agenda_id TEXT NOT NULL REFERENCES agendas(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (agenda_id, user_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    message TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    agenda_id TEXT REFERENCES agendas(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
);

-- Append-only audit trail of external sync attempts
CREATE TABLE IF NOT EXISTS sync_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id TEXT NOT NULL,     -- agenda id or user id
    operation TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT,
    timestamp TEXT NOT NULL
);

-- Singleton settings rows
CREATE TABLE IF NOT EXISTS calendar_shareable (
    singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
    calendar_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_shareable (
    singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
    group_email TEXT NOT NULL,
    group_name TEXT,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_agendas_room_time ON agendas(room_id, start_time, end_time);
CREATE INDEX IF NOT EXISTS idx_agendas_created_by ON agendas(created_by_id);
CREATE INDEX IF NOT EXISTS idx_agendas_sync ON agendas(sync_status, last_sync_attempt);
CREATE INDEX IF NOT EXISTS idx_agenda_access_user ON agenda_access(user_id);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);
CREATE INDEX IF NOT EXISTS idx_notifications_agenda ON notifications(agenda_id);
CREATE INDEX IF NOT EXISTS idx_sync_logs_subject ON sync_logs(subject_id);
CREATE INDEX IF NOT EXISTS idx_sync_logs_op_status ON sync_logs(operation, status);
CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
"#;
