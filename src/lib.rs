// Birth Chart Generator - Core Library
// Exposes all modules for use in CLI, web server, and tests

pub mod numerology;     // Driver / Conductor / Kuaa / Chaldean / Lo Shu
pub mod error;
pub mod form;           // Form field validation
pub mod db;             // SQLite persistence + audit trail
pub mod admin;          // Admin credentials, sessions, panel views
pub mod pdf;
pub mod export;         // CSV + PDF downloads
pub mod render;         // HTML pages
pub mod settings;

#[cfg(feature = "tui")]
pub mod ui;             // ratatui admin console

#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use numerology::{
    BirthChart, BirthRecord, CellStatus, Gender, LoShuGrid,
    chaldean_number, chaldean_value, conductor, digital_root, digital_root_preserve_master,
    driver, has_chaldean_letters, interpretation, kuaa, INTERPRETATIONS,
};
pub use error::{BirthChartError, Result};
pub use form::{RawSubmission, ValidationError, validate};
pub use db::{
    Submission, SubmissionStats, UpsertOutcome, Event,
    open_database, setup_database, upsert_submission, get_all_submissions,
    get_submission_by_phone, delete_submission, get_submission_stats,
    verify_count, insert_event, get_events_for_entity, get_recent_events,
};
pub use admin::{AdminView, SessionStore, hash_password, new_password_hash, verify_credentials};
pub use export::{
    chart_rows, render_chart_pdf, write_chart_csv, write_chart_pdf,
    export_submissions,
};
pub use settings::Settings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
