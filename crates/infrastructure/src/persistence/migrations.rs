//! Database migrations
//!
//! Manages database schema versioning and migrations.
//!
//! ## Timestamps
//!
//! Instants are stored as RFC 3339 text with nanosecond precision and a `Z`
//! suffix. The fixed width keeps lexical order equal to chronological order,
//! so range and `since` comparisons can run in SQL.
//!
//! ## Adding New Migrations
//!
//! 1. Increment `SCHEMA_VERSION` constant
//! 2. Add a new `migrate_vX` function
//! 3. Update `run_migrations` to call the new function

use rusqlite::Connection;
use tracing::{debug, error, info};

use super::connection::DatabaseError;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        info!(
            from_version = current_version,
            to_version = SCHEMA_VERSION,
            "Running database migrations"
        );

        if current_version < 1 {
            if let Err(e) = migrate_v1(conn) {
                error!(
                    version = 1,
                    error = %e,
                    "Migration V001 (calendar cache) failed"
                );
                return Err(e);
            }
        }

        if current_version < 2 {
            if let Err(e) = migrate_v2(conn) {
                error!(
                    version = 2,
                    error = %e,
                    "Migration V002 (account config) failed"
                );
                return Err(e);
            }
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!(version = SCHEMA_VERSION, "Database migrations complete");
    } else {
        debug!(version = current_version, "Database schema is up to date");
    }

    Ok(())
}

/// Get current schema version
fn get_schema_version(conn: &Connection) -> Result<i32, DatabaseError> {
    // Create schema_version table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: events, attendees, alarms and their tombstones
///
/// Event rows reference each other only through `series_id`; deletes of a
/// series are cascaded by the caching layer so every exception gets its own
/// tombstone, hence no foreign keys between the event tables.
fn migrate_v1(conn: &Connection) -> Result<(), DatabaseError> {
    debug!("Applying migration V001: Calendar cache");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS id_sequence (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO id_sequence (name, value) VALUES ('event', 0);

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY,
            uid TEXT,
            series_id INTEGER,
            recurrence_id TEXT,
            folder_id TEXT NOT NULL,
            summary TEXT,
            description TEXT,
            location TEXT,
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            all_day INTEGER NOT NULL DEFAULT 0,
            recurrence_rule TEXT,
            change_exception_dates TEXT NOT NULL DEFAULT '[]',
            classification TEXT NOT NULL,
            transparency TEXT NOT NULL,
            status TEXT,
            organizer TEXT,
            sequence INTEGER NOT NULL DEFAULT 0,
            created_at TEXT,
            created_by INTEGER,
            last_modified TEXT,
            modified_by INTEGER,
            calendar_user INTEGER,
            extended_properties TEXT NOT NULL DEFAULT '{}',
            row_timestamp INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_events_folder ON events(folder_id, start_at);
        CREATE INDEX IF NOT EXISTS idx_events_uid ON events(folder_id, uid);
        CREATE INDEX IF NOT EXISTS idx_events_series ON events(series_id, recurrence_id);

        CREATE TABLE IF NOT EXISTS attendees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            identity TEXT NOT NULL,
            uri TEXT NOT NULL,
            common_name TEXT,
            email TEXT,
            cu_type TEXT NOT NULL,
            role TEXT NOT NULL,
            participation_status TEXT NOT NULL,
            rsvp INTEGER NOT NULL DEFAULT 0,
            comment TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_attendees_event ON attendees(event_id, identity);

        CREATE TABLE IF NOT EXISTS alarms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            uid TEXT NOT NULL,
            action TEXT NOT NULL,
            trigger_kind TEXT NOT NULL CHECK(trigger_kind IN ('relative', 'absolute')),
            trigger_value TEXT NOT NULL,
            description TEXT,
            acknowledged TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_alarms_event ON alarms(event_id, uid);

        CREATE TABLE IF NOT EXISTS event_tombstones (
            event_id INTEGER PRIMARY KEY,
            folder_id TEXT NOT NULL,
            event TEXT NOT NULL,
            deleted_at TEXT NOT NULL,
            deleted_by INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_event_tombstones_folder
            ON event_tombstones(folder_id, deleted_at);

        CREATE TABLE IF NOT EXISTS attendee_tombstones (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            identity TEXT NOT NULL,
            attendee TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attendee_tombstones_event
            ON attendee_tombstones(event_id);
        ",
    )?;

    Ok(())
}

/// Migration to version 2: per-account configuration
fn migrate_v2(conn: &Connection) -> Result<(), DatabaseError> {
    debug!("Applying migration V002: Account config");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS account_config (
            account_id INTEGER PRIMARY KEY,
            config TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
    )?;

    Ok(())
}
