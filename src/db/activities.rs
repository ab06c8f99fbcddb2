use rusqlite::params;

use super::{CrmDb, DbActivity, DbAuditEntry, DbError};

impl CrmDb {
    // =========================================================================
    // Activities (per-lead timeline)
    // =========================================================================

    /// Append an entry to a lead's timeline.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_activity(
        &self,
        lead_id: &str,
        activity_type: &str,
        description: &str,
        actor: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
        created_at: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO activities (lead_id, activity_type, description, actor, old_value, new_value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![lead_id, activity_type, description, actor, old_value, new_value, created_at],
        )?;
        Ok(())
    }

    /// A lead's timeline, most recent first.
    pub fn get_activities_for_lead(&self, lead_id: &str) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, lead_id, activity_type, description, actor, old_value, new_value, created_at
             FROM activities
             WHERE lead_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![lead_id], |row| {
            Ok(DbActivity {
                id: row.get(0)?,
                lead_id: row.get(1)?,
                activity_type: row.get(2)?,
                description: row.get(3)?,
                actor: row.get(4)?,
                old_value: row.get(5)?,
                new_value: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a lead's timeline (only when the lead itself is deleted).
    pub fn delete_activities_for_lead(&self, lead_id: &str) -> Result<usize, DbError> {
        Ok(self.conn_ref().execute(
            "DELETE FROM activities WHERE lead_id = ?1",
            params![lead_id],
        )?)
    }

    // =========================================================================
    // Audit log (administrative trail)
    // =========================================================================

    /// Append an administrative audit entry. Audit rows are never deleted.
    pub fn insert_audit(
        &self,
        action: &str,
        actor: &str,
        target: &str,
        details: &str,
        created_at: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO audit_log (action, actor, target, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![action, actor, target, details, created_at],
        )?;
        Ok(())
    }

    /// Recent audit entries, most recent first.
    pub fn get_audit_log(&self, limit: i64) -> Result<Vec<DbAuditEntry>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, action, actor, target, details, created_at
             FROM audit_log
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(DbAuditEntry {
                id: row.get(0)?,
                action: row.get(1)?,
                actor: row.get(2)?,
                target: row.get(3)?,
                details: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
