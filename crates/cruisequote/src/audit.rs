//! Audit trail collaborator.
//!
//! Writes are fire-and-forget from the caller's point of view: the quote
//! writer logs a failed audit write and carries on.

use chrono::Utc;

use crate::db::{self, audit_repo, Database, DatabaseError};

/// One audit record describing a created entity.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: i64,
    pub supplier_id: Option<i64>,
    pub entity_type: String,
    pub entity_id: i64,
    pub payload: serde_json::Value,
}

pub trait AuditLog: Send + Sync {
    fn log_create(&self, entry: &AuditEntry) -> Result<(), DatabaseError>;
}

/// Audit log stored in the local `audit_log` table.
#[derive(Clone)]
pub struct SqliteAuditLog {
    db: Database,
}

impl SqliteAuditLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl AuditLog for SqliteAuditLog {
    fn log_create(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        audit_repo::insert(
            &self.db,
            &audit_repo::AuditRow {
                id: 0,
                user_id: entry.user_id,
                supplier_id: entry.supplier_id,
                action: "create".to_string(),
                entity_type: entry.entity_type.clone(),
                entity_id: entry.entity_id,
                payload: entry.payload.to_string(),
                created_at: db::timestamp(Utc::now()),
            },
        )?;
        Ok(())
    }
}
