// 🔐 Admin Panel
// Credential check, in-memory sessions, panel navigation state

use crate::db::{insert_event, Event};
use crate::settings::AdminSettings;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{info, warn};

pub const SESSION_COOKIE: &str = "admin_session";

/// Hex SHA-256 of `salt` followed by `password`
pub fn hash_password_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Unsalted hex SHA-256; still accepted in `admin.password_sha256`
pub fn hash_password(password: &str) -> String {
    hash_password_with_salt("", password)
}

/// A fresh `<salt>$<hex>` value for `admin.password_sha256`
pub fn new_password_hash(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, hash_password_with_salt(&salt, password))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// False whenever no password hash is configured. The stored value is
/// either `<salt>$<hex>` or a bare unsalted hex digest.
pub fn verify_credentials(admin: &AdminSettings, username: &str, password: &str) -> bool {
    let Some(stored) = admin.password_sha256.as_deref().map(str::trim) else {
        return false;
    };
    if stored.is_empty() {
        return false;
    }

    let (salt, digest) = stored.split_once('$').unwrap_or(("", stored));
    let digest = digest.to_lowercase();

    let user_ok = constant_time_eq(admin.username.as_bytes(), username.trim().as_bytes());
    let pass_ok = constant_time_eq(digest.as_bytes(), hash_password_with_salt(salt, password).as_bytes());
    user_ok && pass_ok
}

// ============================================================================
// SESSIONS
// ============================================================================

#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, DateTime<Utc>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        SessionStore {
            sessions: HashMap::new(),
            ttl: Duration::minutes(ttl_minutes.max(1)),
        }
    }

    /// Issue a new token that expires after the TTL
    pub fn create(&mut self) -> String {
        self.create_at(Utc::now())
    }

    pub fn create_at(&mut self, now: DateTime<Utc>) -> String {
        self.purge_expired(now);
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), now + self.ttl);
        token
    }

    pub fn is_valid(&mut self, token: &str) -> bool {
        self.is_valid_at(token, Utc::now())
    }

    pub fn is_valid_at(&mut self, token: &str, now: DateTime<Utc>) -> bool {
        match self.sessions.get(token) {
            Some(expires) if *expires > now => true,
            Some(_) => {
                self.sessions.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn revoke(&mut self, token: &str) {
        self.sessions.remove(token);
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.sessions.retain(|_, expires| *expires > now);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Check credentials, record the attempt, and open a session on success
pub fn login(
    conn: &Connection,
    admin: &AdminSettings,
    sessions: &mut SessionStore,
    username: &str,
    password: &str,
) -> Option<String> {
    let ok = verify_credentials(admin, username, password);
    let event_type = if ok { "admin_login" } else { "admin_login_failed" };
    let event = Event::new(event_type, "admin", username.trim(), serde_json::json!({}), username.trim());
    if let Err(e) = insert_event(conn, &event) {
        warn!(error = %e, "failed to record audit event");
    }

    if ok {
        info!(username = %username.trim(), "admin login");
        Some(sessions.create())
    } else {
        warn!(username = %username.trim(), "admin login rejected");
        None
    }
}

// ============================================================================
// PANEL NAVIGATION
// ============================================================================

/// Which admin page is showing. Passed explicitly in the request, never global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminView {
    #[default]
    Records,
    Aggregates,
    Events,
}

impl AdminView {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("aggregates") | Some("stats") => AdminView::Aggregates,
            Some("events") => AdminView::Events,
            _ => AdminView::Records,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            AdminView::Records => "records",
            AdminView::Aggregates => "aggregates",
            AdminView::Events => "events",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AdminView::Records => "Records",
            AdminView::Aggregates => "Aggregates",
            AdminView::Events => "Audit Trail",
        }
    }

    pub fn all() -> [AdminView; 3] {
        [AdminView::Records, AdminView::Aggregates, AdminView::Events]
    }
}
