use crate::form::parse_dob;
use crate::numerology::{BirthChart, BirthRecord, Gender};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// One stored form submission, keyed by phone number
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub birth_time: Option<String>,
    pub place_of_birth: Option<String>,
    pub phone_number: String,
    pub gender: String,
    pub driver: u8,
    pub conductor: u8,
    pub kuaa: Option<u8>,
    pub chaldean: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn kuaa_display(&self) -> String {
        self.kuaa
            .map(|k| k.to_string())
            .unwrap_or_else(|| "Not Available".to_string())
    }

    /// Rebuild the engine input; None if the stored row no longer parses
    pub fn to_record(&self) -> Option<BirthRecord> {
        Some(BirthRecord {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: parse_dob(&self.dob).ok()?,
            gender: Gender::parse(&self.gender)?,
            birth_time: self
                .birth_time
                .as_deref()
                .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok()),
            place_of_birth: self.place_of_birth.clone(),
            phone_number: Some(self.phone_number.clone()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {:?}", path))?;
    setup_database(&conn)?;
    debug!(path = ?path, "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" and that is fine
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Users Table (one row per phone number)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            dob TEXT NOT NULL,
            birth_time TEXT,
            place_of_birth TEXT,
            phone_number TEXT UNIQUE NOT NULL,
            gender TEXT NOT NULL,
            driver INTEGER NOT NULL,
            conductor INTEGER NOT NULL,
            kuaa INTEGER,
            chaldean INTEGER NOT NULL,
            submitted_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_gender ON users(gender)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

const SUBMISSION_COLUMNS: &str = "id, first_name, last_name, dob, birth_time, place_of_birth,
    phone_number, gender, driver, conductor, kuaa, chaldean, submitted_at, updated_at";

fn submission_from_row(row: &Row<'_>) -> rusqlite::Result<Submission> {
    let submitted_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Submission {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        dob: row.get(3)?,
        birth_time: row.get(4)?,
        place_of_birth: row.get(5)?,
        phone_number: row.get(6)?,
        gender: row.get(7)?,
        driver: row.get(8)?,
        conductor: row.get(9)?,
        kuaa: row.get(10)?,
        chaldean: row.get(11)?,
        submitted_at: parse_timestamp(12, &submitted_at)?,
        updated_at: parse_timestamp(13, &updated_at)?,
    })
}

/// Insert a submission, or replace the stored one with the same phone number
pub fn upsert_submission(
    conn: &Connection,
    record: &BirthRecord,
    chart: &BirthChart,
) -> Result<UpsertOutcome> {
    let phone = record
        .phone_number
        .as_deref()
        .context("Phone number is required to store a submission")?;

    let outcome = if get_submission_by_phone(conn, phone)?.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    };

    let now = format_timestamp(&Utc::now());
    let birth_time = record.birth_time.map(|t| t.format("%H:%M:%S").to_string());

    conn.execute(
        "INSERT INTO users (
            first_name, last_name, dob, birth_time, place_of_birth, phone_number,
            gender, driver, conductor, kuaa, chaldean, submitted_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        ON CONFLICT(phone_number) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            dob = excluded.dob,
            birth_time = excluded.birth_time,
            place_of_birth = excluded.place_of_birth,
            gender = excluded.gender,
            driver = excluded.driver,
            conductor = excluded.conductor,
            kuaa = excluded.kuaa,
            chaldean = excluded.chaldean,
            updated_at = excluded.updated_at",
        params![
            record.first_name,
            record.last_name,
            chart.date_of_birth,
            birth_time,
            record.place_of_birth,
            phone,
            record.gender.as_str(),
            chart.driver,
            chart.conductor,
            chart.kuaa,
            chart.chaldean,
            now,
        ],
    )
    .context("Failed to save submission")?;

    let event = Event::new(
        "submission_saved",
        "user",
        phone,
        serde_json::json!({
            "outcome": match outcome {
                UpsertOutcome::Inserted => "inserted",
                UpsertOutcome::Updated => "updated",
            },
            "driver": chart.driver,
            "conductor": chart.conductor,
        }),
        "web_form",
    );
    if let Err(e) = insert_event(conn, &event) {
        warn!(error = %e, "failed to record audit event");
    }

    info!(phone = %phone, outcome = ?outcome, "submission saved");
    Ok(outcome)
}

pub fn get_submission_by_phone(conn: &Connection, phone: &str) -> Result<Option<Submission>> {
    let submission = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE phone_number = ?1", SUBMISSION_COLUMNS),
            [phone],
            submission_from_row,
        )
        .optional()?;

    Ok(submission)
}

/// All submissions, most recently updated first
pub fn get_all_submissions(conn: &Connection) -> Result<Vec<Submission>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY updated_at DESC, id DESC",
        SUBMISSION_COLUMNS
    ))?;

    let submissions = stmt
        .query_map([], submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(submissions)
}

/// Delete one submission. Returns false when no row had that phone number.
pub fn delete_submission(conn: &Connection, phone: &str, actor: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM users WHERE phone_number = ?1", [phone])?;

    if deleted == 0 {
        return Ok(false);
    }

    let event = Event::new("submission_deleted", "user", phone, serde_json::json!({}), actor);
    if let Err(e) = insert_event(conn, &event) {
        warn!(error = %e, "failed to record audit event");
    }

    info!(phone = %phone, actor = %actor, "submission deleted");
    Ok(true)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// AGGREGATES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SubmissionStats {
    pub total: i64,
    pub by_gender: Vec<(String, i64)>,
    pub by_driver: Vec<(u8, i64)>,
    pub by_conductor: Vec<(u8, i64)>,
    pub by_kuaa: Vec<(Option<u8>, i64)>,
    pub by_chaldean: Vec<(u32, i64)>,
}

fn group_counts<T: rusqlite::types::FromSql>(conn: &Connection, column: &str) -> Result<Vec<(T, i64)>> {
    // column names come from the fixed list in get_submission_stats
    let mut stmt = conn.prepare(&format!(
        "SELECT {col}, COUNT(*) FROM users GROUP BY {col} ORDER BY {col}",
        col = column
    ))?;

    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(counts)
}

/// Counts grouped by gender and by each derived number
pub fn get_submission_stats(conn: &Connection) -> Result<SubmissionStats> {
    Ok(SubmissionStats {
        total: verify_count(conn)?,
        by_gender: group_counts(conn, "gender")?,
        by_driver: group_counts(conn, "driver")?,
        by_conductor: group_counts(conn, "conductor")?,
        by_kuaa: group_counts(conn, "kuaa")?,
        by_chaldean: group_counts(conn, "chaldean")?,
    })
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let timestamp_str: String = row.get(1)?;
    let data_json: String = row.get(5)?;

    Ok(Event {
        event_id: row.get(0)?,
        timestamp: parse_timestamp(1, &timestamp_str)?,
        event_type: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        data: serde_json::from_str(&data_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        actor: row.get(6)?,
    })
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Most recent events of any kind
pub fn get_recent_events(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         ORDER BY timestamp DESC, id DESC
         LIMIT ?1",
    )?;

    let events = stmt
        .query_map([limit as i64], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
