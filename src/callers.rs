//! Caller lifecycle: the pool of people leads get rotated across.
//!
//! The credential hash is stored as an opaque string; hashing and
//! verification live outside this crate.

use serde::{Deserialize, Serialize};

use crate::db::{CrmDb, DbCaller};
use crate::error::{CrmError, CrmResult};
use crate::util;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallerPayload {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Create a caller. Usernames are unique; a collision surfaces as
/// `DuplicateKey` rather than being retried, since usernames are chosen by
/// people, not generated.
pub fn create_caller(db: &CrmDb, payload: &CallerPayload, actor: &str) -> CrmResult<DbCaller> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| CrmError::InvalidInput("username is required".to_string()))?;

    let caller = DbCaller {
        id: util::new_id(),
        username: username.to_string(),
        password_hash: payload.password_hash.clone().unwrap_or_default(),
        role: payload.role.clone().unwrap_or_else(|| "caller".to_string()),
        status: "Active".to_string(),
        name: payload.name.clone().unwrap_or_default(),
        email: payload.email.clone().unwrap_or_default(),
        phone: payload.phone.clone().unwrap_or_default(),
        created_at: util::now_rfc3339(),
    };
    db.insert_caller(&caller)
        .map_err(|e| CrmError::from_db(e, "callers.username"))?;

    if let Err(e) = db.insert_audit(
        "caller_created",
        actor,
        &caller.id,
        &format!("Created caller '{username}'"),
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to audit creation of caller {}: {e}", caller.id);
    }
    Ok(caller)
}

/// Update a caller's profile fields. Absent fields keep their values.
pub fn update_caller(db: &CrmDb, id: &str, payload: &CallerPayload) -> CrmResult<DbCaller> {
    let caller = db
        .get_caller(id)?
        .ok_or_else(|| CrmError::NotFound("caller", id.to_string()))?;

    let name = payload.name.clone().unwrap_or(caller.name);
    let email = payload.email.clone().unwrap_or(caller.email);
    let phone = payload.phone.clone().unwrap_or(caller.phone);
    db.update_caller_profile(id, &name, &email, &phone)?;

    db.get_caller(id)?
        .ok_or_else(|| CrmError::NotFound("caller", id.to_string()))
}

/// Activate or deactivate a caller. Inactive callers drop out of rotation
/// but keep their assigned leads.
pub fn set_caller_active(db: &CrmDb, id: &str, active: bool) -> CrmResult<()> {
    if db.get_caller(id)?.is_none() {
        return Err(CrmError::NotFound("caller", id.to_string()));
    }
    db.set_caller_status(id, if active { "Active" } else { "Inactive" })?;
    Ok(())
}

/// Delete a caller. Their leads go back to the unassigned pool; the
/// deletion is audited.
pub fn delete_caller(db: &CrmDb, id: &str, actor: &str) -> CrmResult<()> {
    let caller = db
        .get_caller(id)?
        .ok_or_else(|| CrmError::NotFound("caller", id.to_string()))?;

    let released = db.unassign_leads_of_caller(id)?;
    db.delete_caller(id)?;

    if let Err(e) = db.insert_audit(
        "caller_deleted",
        actor,
        id,
        &format!(
            "Deleted caller '{}', released {released} lead(s)",
            caller.username
        ),
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to audit deletion of caller {id}: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    fn payload(username: &str) -> CallerPayload {
        CallerPayload {
            username: Some(username.to_string()),
            password_hash: Some("argon2id$...".to_string()),
            email: Some(format!("{username}@example.com")),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults_to_active_caller_role() {
        let db = test_db();
        let caller = create_caller(&db, &payload("amit"), "admin").expect("create");
        assert_eq!(caller.role, "caller");
        assert!(caller.is_active());
        assert_eq!(db.get_audit_log(5).expect("audit")[0].action, "caller_created");
    }

    #[test]
    fn test_duplicate_username_surfaces_as_duplicate_key() {
        let db = test_db();
        create_caller(&db, &payload("amit"), "admin").expect("create");
        let err = create_caller(&db, &payload("amit"), "admin").expect_err("duplicate");
        assert!(matches!(err, CrmError::DuplicateKey(_)));
    }

    #[test]
    fn test_deactivation_removes_from_rotation() {
        let db = test_db();
        let caller = create_caller(&db, &payload("amit"), "admin").expect("create");
        set_caller_active(&db, &caller.id, false).expect("deactivate");
        assert!(db.get_active_callers().expect("list").is_empty());
        set_caller_active(&db, &caller.id, true).expect("reactivate");
        assert_eq!(db.get_active_callers().expect("list").len(), 1);
    }

    #[test]
    fn test_delete_releases_assigned_leads() {
        let db = test_db();
        let caller = create_caller(&db, &payload("amit"), "admin").expect("create");
        let lead = crate::leads::create_lead(
            &db,
            &crate::leads::LeadPayload {
                name: Some("Asha".to_string()),
                ..Default::default()
            },
            "admin",
        )
        .expect("lead");
        db.set_lead_assignment(&lead.id, &caller.id, "amit", "2026-01-01T00:00:00Z")
            .expect("assign");

        delete_caller(&db, &caller.id, "admin").expect("delete");
        let lead = db.get_lead(&lead.id).expect("get").expect("present");
        assert!(lead.assigned_caller.is_none());
        assert!(db.get_caller(&caller.id).expect("get").is_none());
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let db = test_db();
        let caller = create_caller(&db, &payload("amit"), "admin").expect("create");
        let updated = update_caller(
            &db,
            &caller.id,
            &CallerPayload {
                name: Some("Amit K".to_string()),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(updated.name, "Amit K");
        assert_eq!(updated.email, "amit@example.com");
    }
}
