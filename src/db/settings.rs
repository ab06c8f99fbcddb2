use rusqlite::params;

use super::{CrmDb, DbError};

/// Key under which the rotation cursor is persisted.
pub const ROUND_ROBIN_KEY: &str = "round_robin_index";

impl CrmDb {
    // =========================================================================
    // Settings (key/value)
    // =========================================================================

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .conn_ref()
            .prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, crate::util::now_rfc3339()],
        )?;
        Ok(())
    }

    // =========================================================================
    // Rotation cursor
    // =========================================================================

    /// Atomically fetch-and-advance the rotation cursor.
    ///
    /// A single upsert both seeds the row (first call yields 0) and bumps it,
    /// so two concurrent assignments can never observe the same cursor value.
    /// Only call this once a non-empty roster has been confirmed; the cursor
    /// must not advance when there is nobody to assign.
    pub fn next_assignment_cursor(&self) -> Result<i64, DbError> {
        let value: i64 = self.conn_ref().query_row(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, '1', ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
                updated_at = excluded.updated_at
             RETURNING CAST(value AS INTEGER) - 1",
            params![ROUND_ROBIN_KEY, crate::util::now_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    /// Read the cursor without advancing it. 0 when never used.
    pub fn peek_assignment_cursor(&self) -> Result<i64, DbError> {
        Ok(self
            .get_setting(ROUND_ROBIN_KEY)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    // =========================================================================
    // Typed settings
    // =========================================================================

    /// Stage given to intake leads that arrive without one.
    pub fn default_lead_stage(&self) -> Result<String, DbError> {
        Ok(self
            .get_setting("default_lead_stage")?
            .unwrap_or_else(|| "New Lead".to_string()))
    }

    pub fn default_call_type(&self) -> Result<String, DbError> {
        Ok(self
            .get_setting("default_call_type")?
            .unwrap_or_else(|| "Inbound".to_string()))
    }

    /// Whether freshly imported leads are rotated to a caller. Off until
    /// someone turns it on; rotation is opt-in.
    pub fn auto_assign_new_leads(&self) -> Result<bool, DbError> {
        Ok(self
            .get_setting("auto_assign_new_leads")?
            .map(|v| v != "false" && v != "0")
            .unwrap_or(false))
    }

    /// Webhook endpoint for assignment notifications, if configured.
    pub fn notify_webhook_url(&self) -> Result<Option<String>, DbError> {
        Ok(self
            .get_setting("notify_webhook_url")?
            .filter(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;

    #[test]
    fn test_set_get_roundtrip() {
        let db = test_db();
        assert!(db.get_setting("theme").expect("get").is_none());
        db.set_setting("theme", "dark").expect("set");
        assert_eq!(db.get_setting("theme").expect("get").as_deref(), Some("dark"));
        db.set_setting("theme", "light").expect("overwrite");
        assert_eq!(
            db.get_setting("theme").expect("get").as_deref(),
            Some("light")
        );
    }

    #[test]
    fn test_cursor_starts_at_zero_and_advances() {
        let db = test_db();
        assert_eq!(db.peek_assignment_cursor().expect("peek"), 0);
        assert_eq!(db.next_assignment_cursor().expect("next"), 0);
        assert_eq!(db.next_assignment_cursor().expect("next"), 1);
        assert_eq!(db.next_assignment_cursor().expect("next"), 2);
        assert_eq!(db.peek_assignment_cursor().expect("peek"), 3);
    }

    #[test]
    fn test_typed_defaults() {
        let db = test_db();
        assert_eq!(db.default_lead_stage().expect("stage"), "New Lead");
        assert_eq!(db.default_call_type().expect("type"), "Inbound");
        assert!(
            !db.auto_assign_new_leads().expect("auto"),
            "rotation is opt-in on a fresh store"
        );
        assert!(db.notify_webhook_url().expect("url").is_none());

        db.set_setting("auto_assign_new_leads", "true").expect("set");
        assert!(db.auto_assign_new_leads().expect("auto"));
        db.set_setting("auto_assign_new_leads", "false").expect("set");
        assert!(!db.auto_assign_new_leads().expect("auto"));
        db.set_setting("notify_webhook_url", "").expect("set");
        assert!(db.notify_webhook_url().expect("url").is_none());
    }
}
