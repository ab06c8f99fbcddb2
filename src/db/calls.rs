use rusqlite::params;

use super::{CrmDb, DbCall, DbError};

const CALL_COLUMNS: &str =
    "id, lead_id, caller_id, caller_name, call_type, duration_secs, notes, next_follow_up, created_at";

impl CrmDb {
    // =========================================================================
    // Calls
    // =========================================================================

    /// Append a call record. Calls are never updated or deleted individually.
    pub fn insert_call(&self, call: &DbCall) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO calls (id, lead_id, caller_id, caller_name, call_type, duration_secs, notes, next_follow_up, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                call.id,
                call.lead_id,
                call.caller_id,
                call.caller_name,
                call.call_type,
                call.duration_secs,
                call.notes,
                call.next_follow_up,
                call.created_at,
            ],
        )?;
        Ok(())
    }

    /// Calls for a lead, most recent first.
    pub fn get_calls_for_lead(&self, lead_id: &str) -> Result<Vec<DbCall>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE lead_id = ?1
             ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![lead_id], Self::map_call_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The most recent call for a lead, if any.
    pub fn last_call_for_lead(&self, lead_id: &str) -> Result<Option<DbCall>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE lead_id = ?1
             ORDER BY created_at DESC, id
             LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![lead_id], Self::map_call_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All calls logged at or after a timestamp, most recent first.
    pub fn get_calls_since(&self, since: &str) -> Result<Vec<DbCall>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE created_at >= ?1
             ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![since], Self::map_call_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_calls(&self) -> Result<i64, DbError> {
        Ok(self
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM calls", [], |row| row.get(0))?)
    }

    /// Remove the call history of a lead (only when the lead itself is
    /// deleted).
    pub fn delete_calls_for_lead(&self, lead_id: &str) -> Result<usize, DbError> {
        Ok(self
            .conn_ref()
            .execute("DELETE FROM calls WHERE lead_id = ?1", params![lead_id])?)
    }

    /// Helper: map a row to `DbCall`.
    fn map_call_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbCall> {
        Ok(DbCall {
            id: row.get(0)?,
            lead_id: row.get(1)?,
            caller_id: row.get(2)?,
            caller_name: row.get(3)?,
            call_type: row.get(4)?,
            duration_secs: row.get(5)?,
            notes: row.get(6)?,
            next_follow_up: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use crate::db::DbCall;

    fn sample_call(id: &str, lead_id: &str, created_at: &str) -> DbCall {
        DbCall {
            id: id.to_string(),
            lead_id: lead_id.to_string(),
            caller_id: Some("c1".to_string()),
            caller_name: Some("Ravi".to_string()),
            call_type: "Outbound".to_string(),
            duration_secs: 60,
            notes: String::new(),
            next_follow_up: None,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_last_call_is_most_recent() {
        let db = test_db();
        db.insert_call(&sample_call("k1", "l1", "2026-01-01T10:00:00Z"))
            .expect("insert");
        db.insert_call(&sample_call("k2", "l1", "2026-01-02T10:00:00Z"))
            .expect("insert");
        db.insert_call(&sample_call("k3", "other", "2026-01-03T10:00:00Z"))
            .expect("insert");

        let last = db
            .last_call_for_lead("l1")
            .expect("query")
            .expect("present");
        assert_eq!(last.id, "k2");
        assert!(db.last_call_for_lead("unknown").expect("query").is_none());
    }

    #[test]
    fn test_call_history_is_newest_first_per_lead() {
        let db = test_db();
        db.insert_call(&sample_call("k1", "l1", "2026-01-01T10:00:00Z"))
            .expect("insert");
        db.insert_call(&sample_call("k2", "l1", "2026-01-03T10:00:00Z"))
            .expect("insert");
        db.insert_call(&sample_call("k3", "l1", "2026-01-02T10:00:00Z"))
            .expect("insert");
        db.insert_call(&sample_call("k4", "other", "2026-01-04T10:00:00Z"))
            .expect("insert");

        let history = db.get_calls_for_lead("l1").expect("history");
        let ids: Vec<&str> = history.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["k2", "k3", "k1"]);
        assert!(db.get_calls_for_lead("unknown").expect("history").is_empty());
    }

    #[test]
    fn test_calls_since_filters_by_timestamp() {
        let db = test_db();
        db.insert_call(&sample_call("k1", "l1", "2026-01-01T10:00:00Z"))
            .expect("insert");
        db.insert_call(&sample_call("k2", "l1", "2026-02-01T10:00:00Z"))
            .expect("insert");

        let recent = db.get_calls_since("2026-01-15T00:00:00Z").expect("query");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "k2");
    }
}
