use rusqlite::params;

use super::{CrmDb, DbCaller, DbError};

const CALLER_COLUMNS: &str =
    "id, username, password_hash, role, status, name, email, phone, created_at";

impl CrmDb {
    // =========================================================================
    // Callers
    // =========================================================================

    /// Insert a new caller. Fails with a constraint violation when the
    /// username is already taken.
    pub fn insert_caller(&self, caller: &DbCaller) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO callers (id, username, password_hash, role, status, name, email, phone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                caller.id,
                caller.username,
                caller.password_hash,
                caller.role,
                caller.status,
                caller.name,
                caller.email,
                caller.phone,
                caller.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_caller(&self, id: &str) -> Result<Option<DbCaller>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALLER_COLUMNS} FROM callers WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_caller_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_caller_by_username(&self, username: &str) -> Result<Option<DbCaller>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALLER_COLUMNS} FROM callers WHERE username = ?1"
        ))?;
        let mut rows = stmt.query_map(params![username], Self::map_caller_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All callers in stable creation order. Rotation depends on this order
    /// staying the same between reads.
    pub fn get_callers(&self) -> Result<Vec<DbCaller>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALLER_COLUMNS} FROM callers ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], Self::map_caller_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Active callers only, same stable order as `get_callers`.
    pub fn get_active_callers(&self) -> Result<Vec<DbCaller>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {CALLER_COLUMNS} FROM callers WHERE status = 'Active' ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], Self::map_caller_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Flip a caller between Active and Inactive.
    pub fn set_caller_status(&self, id: &str, status: &str) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE callers SET status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(())
    }

    /// Update the caller's profile fields. Username and credentials are
    /// managed separately.
    pub fn update_caller_profile(
        &self,
        id: &str,
        name: &str,
        email: &str,
        phone: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE callers SET name = ?2, email = ?3, phone = ?4 WHERE id = ?1",
            params![id, name, email, phone],
        )?;
        Ok(())
    }

    /// Delete a caller row. Returns true if a row was removed.
    pub fn delete_caller(&self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn_ref()
            .execute("DELETE FROM callers WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Helper: map a row to `DbCaller`.
    fn map_caller_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbCaller> {
        Ok(DbCaller {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            role: row.get(3)?,
            status: row.get(4)?,
            name: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}
