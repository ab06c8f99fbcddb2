use rusqlite::params;

use super::{CrmDb, DbError, DbLead};

/// Optional filters for lead listings. All filters are ANDed together.
#[derive(Debug, Default, Clone)]
pub struct LeadFilter {
    pub stage: Option<String>,
    pub source: Option<String>,
    pub assigned_caller: Option<String>,
}

const LEAD_COLUMNS: &str = "id, name, phone, phone_digits, email, city, value, source, stage,
            priority, assigned_caller, assigned_caller_name, assigned_at,
            next_follow_up, not_interested_reason, not_interested_note, created_at";

impl CrmDb {
    // =========================================================================
    // Leads
    // =========================================================================

    /// Insert a new lead row. Fails with a constraint violation if the id is
    /// already taken.
    pub fn insert_lead(&self, lead: &DbLead) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO leads (
                id, name, phone, phone_digits, email, city, value, source, stage,
                priority, assigned_caller, assigned_caller_name, assigned_at,
                next_follow_up, not_interested_reason, not_interested_note, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                lead.id,
                lead.name,
                lead.phone,
                lead.phone_digits,
                lead.email,
                lead.city,
                lead.value,
                lead.source,
                lead.stage,
                lead.priority,
                lead.assigned_caller,
                lead.assigned_caller_name,
                lead.assigned_at,
                lead.next_follow_up,
                lead.not_interested_reason,
                lead.not_interested_note,
                lead.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a lead by id.
    pub fn get_lead(&self, id: &str) -> Result<Option<DbLead>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_lead_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Overwrite the mutable fields of a lead. The id and created_at never
    /// change after insert.
    pub fn update_lead(&self, lead: &DbLead) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE leads SET
                name = ?2, phone = ?3, phone_digits = ?4, email = ?5, city = ?6,
                value = ?7, source = ?8, stage = ?9, priority = ?10,
                assigned_caller = ?11, assigned_caller_name = ?12, assigned_at = ?13,
                next_follow_up = ?14, not_interested_reason = ?15, not_interested_note = ?16
             WHERE id = ?1",
            params![
                lead.id,
                lead.name,
                lead.phone,
                lead.phone_digits,
                lead.email,
                lead.city,
                lead.value,
                lead.source,
                lead.stage,
                lead.priority,
                lead.assigned_caller,
                lead.assigned_caller_name,
                lead.assigned_at,
                lead.next_follow_up,
                lead.not_interested_reason,
                lead.not_interested_note,
            ],
        )?;
        Ok(())
    }

    /// Update just the stage column.
    pub fn set_lead_stage(&self, id: &str, stage: &str) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE leads SET stage = ?2 WHERE id = ?1",
            params![id, stage],
        )?;
        Ok(())
    }

    /// Update just the follow-up column. `None` clears it.
    pub fn set_lead_next_follow_up(
        &self,
        id: &str,
        next_follow_up: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE leads SET next_follow_up = ?2 WHERE id = ?1",
            params![id, next_follow_up],
        )?;
        Ok(())
    }

    /// Record an assignment on the lead row.
    pub fn set_lead_assignment(
        &self,
        id: &str,
        caller_id: &str,
        caller_name: &str,
        assigned_at: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE leads SET assigned_caller = ?2, assigned_caller_name = ?3, assigned_at = ?4
             WHERE id = ?1",
            params![id, caller_id, caller_name, assigned_at],
        )?;
        Ok(())
    }

    /// Clear the assignment on leads owned by a caller (used when the caller
    /// is deleted).
    pub fn unassign_leads_of_caller(&self, caller_id: &str) -> Result<usize, DbError> {
        let changed = self.conn_ref().execute(
            "UPDATE leads SET assigned_caller = NULL, assigned_caller_name = NULL, assigned_at = NULL
             WHERE assigned_caller = ?1",
            params![caller_id],
        )?;
        Ok(changed)
    }

    /// Find the newest lead sharing a phone fingerprint. Empty fingerprints
    /// never match anything.
    pub fn find_lead_by_fingerprint(&self, digits: &str) -> Result<Option<DbLead>, DbError> {
        if digits.is_empty() {
            return Ok(None);
        }
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE phone_digits = ?1
             ORDER BY created_at DESC, id
             LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![digits], Self::map_lead_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List leads newest-first, optionally filtered by stage, source, and
    /// assigned caller.
    pub fn get_leads(&self, filter: &LeadFilter) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE (?1 IS NULL OR stage = ?1)
               AND (?2 IS NULL OR source = ?2)
               AND (?3 IS NULL OR assigned_caller = ?3)
             ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(
            params![filter.stage, filter.source, filter.assigned_caller],
            Self::map_lead_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All leads, newest first.
    pub fn get_all_leads(&self) -> Result<Vec<DbLead>, DbError> {
        self.get_leads(&LeadFilter::default())
    }

    pub fn count_leads(&self) -> Result<i64, DbError> {
        Ok(self
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?)
    }

    /// Delete a lead row. Returns true if a row was removed.
    pub fn delete_lead(&self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn_ref()
            .execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Helper: map a row to `DbLead`.
    pub(crate) fn map_lead_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbLead> {
        Ok(DbLead {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            phone_digits: row.get(3)?,
            email: row.get(4)?,
            city: row.get(5)?,
            value: row.get(6)?,
            source: row.get(7)?,
            stage: row.get(8)?,
            priority: row.get(9)?,
            assigned_caller: row.get(10)?,
            assigned_caller_name: row.get(11)?,
            assigned_at: row.get(12)?,
            next_follow_up: row.get(13)?,
            not_interested_reason: row.get(14)?,
            not_interested_note: row.get(15)?,
            created_at: row.get(16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::db::DbLead;

    fn sample_lead(id: &str, phone: &str, created_at: &str) -> DbLead {
        DbLead {
            id: id.to_string(),
            name: format!("Lead {id}"),
            phone: phone.to_string(),
            phone_digits: crate::util::digits_only(phone),
            email: String::new(),
            city: String::new(),
            value: 0.0,
            source: "Website".to_string(),
            stage: "New Lead".to_string(),
            priority: "Warm".to_string(),
            assigned_caller: None,
            assigned_caller_name: None,
            assigned_at: None,
            next_follow_up: None,
            not_interested_reason: None,
            not_interested_note: None,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_insert_and_get_lead() {
        let db = test_db();
        let lead = sample_lead("l1", "+91 555-0001", "2026-01-01T00:00:00Z");
        db.insert_lead(&lead).expect("insert");

        let fetched = db.get_lead("l1").expect("get").expect("present");
        assert_eq!(fetched.phone_digits, "915550001");
        assert_eq!(fetched.stage, "New Lead");
        assert!(db.get_lead("missing").expect("get").is_none());
    }

    #[test]
    fn test_duplicate_id_violates_constraint() {
        let db = test_db();
        db.insert_lead(&sample_lead("l1", "1", "2026-01-01T00:00:00Z"))
            .expect("insert");
        let err = db
            .insert_lead(&sample_lead("l1", "2", "2026-01-02T00:00:00Z"))
            .expect_err("duplicate id");
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_fingerprint_lookup_returns_newest() {
        let db = test_db();
        db.insert_lead(&sample_lead("old", "555 0001", "2026-01-01T00:00:00Z"))
            .expect("insert");
        db.insert_lead(&sample_lead("new", "(555) 0001", "2026-02-01T00:00:00Z"))
            .expect("insert");

        let hit = db
            .find_lead_by_fingerprint("5550001")
            .expect("lookup")
            .expect("present");
        assert_eq!(hit.id, "new");

        assert!(db.find_lead_by_fingerprint("").expect("lookup").is_none());
    }

    #[test]
    fn test_list_is_newest_first_with_filters() {
        let db = test_db();
        db.insert_lead(&sample_lead("a", "1", "2026-01-01T00:00:00Z"))
            .expect("insert");
        db.insert_lead(&sample_lead("b", "2", "2026-01-03T00:00:00Z"))
            .expect("insert");
        let mut c = sample_lead("c", "3", "2026-01-02T00:00:00Z");
        c.stage = "Contacted".to_string();
        db.insert_lead(&c).expect("insert");

        let all = db.get_all_leads().expect("list");
        let ids: Vec<&str> = all.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let contacted = db
            .get_leads(&LeadFilter {
                stage: Some("Contacted".to_string()),
                ..Default::default()
            })
            .expect("list");
        assert_eq!(contacted.len(), 1);
        assert_eq!(contacted[0].id, "c");
    }

    #[test]
    fn test_assignment_and_unassign_cascade() {
        let db = test_db();
        db.insert_lead(&sample_lead("l1", "1", "2026-01-01T00:00:00Z"))
            .expect("insert");
        db.set_lead_assignment("l1", "c1", "Ravi", "2026-01-02T00:00:00Z")
            .expect("assign");

        let lead = db.get_lead("l1").expect("get").expect("present");
        assert_eq!(lead.assigned_caller.as_deref(), Some("c1"));

        let cleared = db.unassign_leads_of_caller("c1").expect("unassign");
        assert_eq!(cleared, 1);
        let lead = db.get_lead("l1").expect("get").expect("present");
        assert!(lead.assigned_caller.is_none());
        assert!(lead.assigned_at.is_none());
    }
}
