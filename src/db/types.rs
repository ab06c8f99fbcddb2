//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

impl DbError {
    /// True when the underlying SQLite error is a uniqueness-constraint
    /// violation (duplicate lead id, duplicate caller username).
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// A row from the `leads` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLead {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Digits-only fingerprint of `phone`; empty when the phone has no digits.
    pub phone_digits: String,
    pub email: String,
    pub city: String,
    pub value: f64,
    pub source: String,
    pub stage: String,
    pub priority: String,
    pub assigned_caller: Option<String>,
    pub assigned_caller_name: Option<String>,
    pub assigned_at: Option<String>,
    pub next_follow_up: Option<String>,
    pub not_interested_reason: Option<String>,
    pub not_interested_note: Option<String>,
    pub created_at: String,
}

/// A row from the `callers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCaller {
    pub id: String,
    pub username: String,
    /// Opaque credential hash; verification lives outside the core.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: String,
}

impl DbCaller {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }

    /// Name to show in reports: display name, falling back to username.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

/// A row from the `calls` table. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCall {
    pub id: String,
    pub lead_id: String,
    pub caller_id: Option<String>,
    pub caller_name: Option<String>,
    pub call_type: String,
    pub duration_secs: i64,
    pub notes: String,
    /// Explicit next-follow-up override supplied with the call, if any.
    pub next_follow_up: Option<String>,
    pub created_at: String,
}

/// A row from the `activities` table. Append-only per-lead timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbActivity {
    pub id: i64,
    pub lead_id: String,
    pub activity_type: String,
    pub description: String,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: String,
}

/// Activity type tags. Kept as constants rather than an enum: the timeline
/// is a display artifact and new tags must not break old readers.
pub mod activity {
    pub const LEAD_CREATED: &str = "lead_created";
    pub const LEAD_UPDATED: &str = "lead_updated";
    pub const LEAD_IMPORTED: &str = "lead_imported";
    pub const STAGE_CHANGED: &str = "stage_changed";
    pub const ASSIGNED: &str = "assigned";
    pub const CALL: &str = "call";
    pub const FOLLOW_UP_SCHEDULED: &str = "follow_up_scheduled";
}

/// A row from the `audit_log` table. Administrative trail, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditEntry {
    pub id: i64,
    pub action: String,
    pub actor: String,
    pub target: String,
    pub details: String,
    pub created_at: String,
}
