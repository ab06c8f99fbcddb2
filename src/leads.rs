//! Lead intake: validated creation, field updates, deletion, listings.

use serde::{Deserialize, Serialize};

use crate::db::{activity, CrmDb, DbLead, LeadFilter};
use crate::dedupe::{self, MergeRule};
use crate::error::{CrmError, CrmResult};
use crate::stage::{label_is_converted, Stage};
use crate::util;

/// Incoming lead fields, as supplied by manual entry or an import row.
/// Everything except the name is optional; absent fields fall back to
/// defaults on create and leave existing values alone on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub value: Option<f64>,
    pub source: Option<String>,
    pub stage: Option<String>,
    pub priority: Option<String>,
    pub created_at: Option<String>,
}

/// Canonicalize a stage label: known labels (including the legacy aliases)
/// are written back in canonical form, unknown labels pass through as-is.
pub(crate) fn canonical_stage(label: &str) -> String {
    match Stage::parse(label) {
        Some(stage) => stage.label().to_string(),
        None => label.to_string(),
    }
}

/// Build a fresh lead row from an intake payload.
fn build_lead(db: &CrmDb, payload: &LeadPayload) -> CrmResult<DbLead> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CrmError::InvalidInput("lead name is required".to_string()))?;

    let phone = payload.phone.clone().unwrap_or_default();
    let stage = match &payload.stage {
        Some(s) if !s.is_empty() => canonical_stage(s),
        _ => db.default_lead_stage()?,
    };
    let created_at = util::parse_timestamp_lenient(payload.created_at.as_deref());

    Ok(DbLead {
        id: payload
            .id
            .as_deref()
            .and_then(util::valid_lead_id)
            .unwrap_or_else(util::new_id),
        name: name.to_string(),
        phone_digits: util::digits_only(&phone),
        phone,
        email: payload.email.clone().unwrap_or_default(),
        city: payload.city.clone().unwrap_or_default(),
        value: payload.value.unwrap_or(0.0),
        source: payload.source.clone().unwrap_or_default(),
        stage,
        priority: payload
            .priority
            .clone()
            .unwrap_or_else(|| "Warm".to_string()),
        assigned_caller: None,
        assigned_caller_name: None,
        assigned_at: None,
        next_follow_up: None,
        not_interested_reason: None,
        not_interested_note: None,
        created_at: util::to_rfc3339(created_at),
    })
}

/// Insert a lead, retrying exactly once with a fresh id when the chosen id
/// collides. A second collision surfaces as `DuplicateKey`.
pub(crate) fn insert_with_retry(db: &CrmDb, mut lead: DbLead) -> CrmResult<DbLead> {
    match db.insert_lead(&lead) {
        Ok(()) => Ok(lead),
        Err(e) if e.is_unique_violation() => {
            log::warn!(
                "Lead id {} already taken, retrying with a fresh id",
                lead.id
            );
            lead.id = util::new_id();
            db.insert_lead(&lead)
                .map_err(|e| CrmError::from_db(e, "leads.id"))?;
            Ok(lead)
        }
        Err(e) => Err(CrmError::Db(e)),
    }
}

/// Create a lead from an intake payload.
pub fn create_lead(db: &CrmDb, payload: &LeadPayload, actor: &str) -> CrmResult<DbLead> {
    let lead = insert_with_retry(db, build_lead(db, payload)?)?;

    // Secondary write: a missing timeline entry is not worth failing creation
    if let Err(e) = db.insert_activity(
        &lead.id,
        activity::LEAD_CREATED,
        &format!("Lead '{}' created", lead.name),
        actor,
        None,
        None,
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to record creation activity for lead {}: {e}", lead.id);
    }

    Ok(lead)
}

/// Apply an intake payload on top of an existing lead. Absent fields keep
/// their stored values; a stage change goes through the scheduler so the
/// follow-up and timeline stay consistent.
pub fn update_lead(db: &CrmDb, id: &str, payload: &LeadPayload, actor: &str) -> CrmResult<DbLead> {
    let mut lead = db
        .get_lead(id)?
        .ok_or_else(|| CrmError::NotFound("lead", id.to_string()))?;

    let rule = MergeRule::PreferIncoming;
    lead.name = rule.apply_str(payload.name.as_deref(), &lead.name);
    lead.phone = rule.apply_str(payload.phone.as_deref(), &lead.phone);
    lead.phone_digits = util::digits_only(&lead.phone);
    lead.email = rule.apply_str(payload.email.as_deref(), &lead.email);
    lead.city = rule.apply_str(payload.city.as_deref(), &lead.city);
    lead.source = rule.apply_str(payload.source.as_deref(), &lead.source);
    lead.priority = rule.apply_str(payload.priority.as_deref(), &lead.priority);
    if let Some(value) = payload.value {
        lead.value = value;
    }
    db.update_lead(&lead)?;

    if let Err(e) = db.insert_activity(
        &lead.id,
        activity::LEAD_UPDATED,
        "Lead details updated",
        actor,
        None,
        None,
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to record update activity for lead {}: {e}", lead.id);
    }

    match &payload.stage {
        Some(stage) if !stage.is_empty() && canonical_stage(stage) != lead.stage => {
            crate::scheduler::record_stage_change(db, id, stage, actor)
        }
        _ => Ok(lead),
    }
}

/// Delete a lead and its history; the deletion is recorded in the audit log.
pub fn delete_lead(db: &CrmDb, id: &str, actor: &str) -> CrmResult<()> {
    let lead = db
        .get_lead(id)?
        .ok_or_else(|| CrmError::NotFound("lead", id.to_string()))?;

    db.with_transaction(|tx| {
        tx.delete_calls_for_lead(id).map_err(|e| e.to_string())?;
        tx.delete_activities_for_lead(id).map_err(|e| e.to_string())?;
        tx.delete_lead(id).map_err(|e| e.to_string())?;
        Ok(())
    })
    .map_err(crate::db::DbError::Transaction)?;

    if let Err(e) = db.insert_audit(
        "lead_deleted",
        actor,
        id,
        &format!("Deleted lead '{}'", lead.name),
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to audit deletion of lead {id}: {e}");
    }
    Ok(())
}

/// Bulk deletion. Missing ids are skipped; returns how many were removed.
pub fn delete_leads(db: &CrmDb, ids: &[String], actor: &str) -> CrmResult<usize> {
    let mut deleted = 0;
    for id in ids {
        match delete_lead(db, id, actor) {
            Ok(()) => deleted += 1,
            Err(CrmError::NotFound(..)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(deleted)
}

/// List leads newest-first with duplicates collapsed.
pub fn list_leads(db: &CrmDb, filter: &LeadFilter) -> CrmResult<Vec<DbLead>> {
    Ok(dedupe::dedupe(db.get_leads(filter)?))
}

/// Won deals (the customers view), deduplicated, newest first.
pub fn won_leads(db: &CrmDb) -> CrmResult<Vec<DbLead>> {
    let mut leads = dedupe::dedupe(db.get_all_leads()?);
    leads.retain(|l| label_is_converted(&l.stage));
    Ok(leads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    fn payload(name: &str, phone: &str) -> LeadPayload {
        LeadPayload {
            name: Some(name.to_string()),
            phone: Some(phone.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults_and_fingerprint() {
        let db = test_db();
        let lead = create_lead(&db, &payload("Asha", "+91 555-0001"), "admin").expect("create");
        assert_eq!(lead.stage, "New Lead");
        assert_eq!(lead.phone_digits, "915550001");
        assert_eq!(lead.priority, "Warm");
        assert!(lead.next_follow_up.is_none());

        let timeline = db.get_activities_for_lead(&lead.id).expect("timeline");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].activity_type, activity::LEAD_CREATED);
    }

    #[test]
    fn test_create_requires_name() {
        let db = test_db();
        let err = create_lead(&db, &payload("  ", "555"), "admin").expect_err("no name");
        assert!(matches!(err, CrmError::InvalidInput(_)));
    }

    #[test]
    fn test_create_retries_duplicate_id_once() {
        let db = test_db();
        let taken = "550e8400-e29b-41d4-a716-446655440000";
        let mut first = payload("First", "1");
        first.id = Some(taken.to_string());
        create_lead(&db, &first, "admin").expect("create");

        let mut second = payload("Second", "2");
        second.id = Some(taken.to_string());
        let lead = create_lead(&db, &second, "admin").expect("retry succeeds");
        assert_ne!(lead.id, taken);
        assert_eq!(db.count_leads().expect("count"), 2);
    }

    #[test]
    fn test_create_canonicalizes_legacy_stage_alias() {
        let db = test_db();
        let mut p = payload("Asha", "1");
        p.stage = Some("Won".to_string());
        let lead = create_lead(&db, &p, "admin").expect("create");
        assert_eq!(lead.stage, "Closed Won");
    }

    #[test]
    fn test_create_substitutes_now_for_bad_timestamp() {
        let db = test_db();
        let mut p = payload("Asha", "1");
        p.created_at = Some("yesterday-ish".to_string());
        let lead = create_lead(&db, &p, "admin").expect("create");
        assert!(crate::util::parse_timestamp(&lead.created_at).is_some());
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let db = test_db();
        let lead = create_lead(&db, &payload("Asha", "555-0001"), "admin").expect("create");

        let update = LeadPayload {
            city: Some("Pune".to_string()),
            value: Some(5000.0),
            ..Default::default()
        };
        let updated = update_lead(&db, &lead.id, &update, "admin").expect("update");
        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.phone, "555-0001");
        assert_eq!(updated.city, "Pune");
        assert_eq!(updated.value, 5000.0);
    }

    #[test]
    fn test_update_missing_lead_is_not_found() {
        let db = test_db();
        let err = update_lead(&db, "nope", &LeadPayload::default(), "admin")
            .expect_err("missing lead");
        assert!(matches!(err, CrmError::NotFound("lead", _)));
    }

    #[test]
    fn test_delete_cascades_and_audits() {
        let db = test_db();
        let lead = create_lead(&db, &payload("Asha", "1"), "admin").expect("create");
        delete_lead(&db, &lead.id, "admin").expect("delete");

        assert!(db.get_lead(&lead.id).expect("get").is_none());
        assert!(db
            .get_activities_for_lead(&lead.id)
            .expect("timeline")
            .is_empty());
        let audit = db.get_audit_log(10).expect("audit");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "lead_deleted");
        assert_eq!(audit[0].target, lead.id);

        let err = delete_lead(&db, &lead.id, "admin").expect_err("already gone");
        assert!(matches!(err, CrmError::NotFound("lead", _)));
    }

    #[test]
    fn test_bulk_delete_skips_missing_ids() {
        let db = test_db();
        let a = create_lead(&db, &payload("A", "1"), "admin").expect("create");
        let b = create_lead(&db, &payload("B", "2"), "admin").expect("create");

        let ids = vec![a.id.clone(), "ghost".to_string(), b.id.clone()];
        let deleted = delete_leads(&db, &ids, "admin").expect("bulk delete");
        assert_eq!(deleted, 2, "missing ids are skipped, not fatal");
        assert_eq!(db.count_leads().expect("count"), 0);

        let audit = db.get_audit_log(10).expect("audit");
        assert_eq!(
            audit.iter().filter(|e| e.action == "lead_deleted").count(),
            2
        );
    }

    #[test]
    fn test_listing_collapses_duplicates() {
        let db = test_db();
        let mut old = payload("Old", "555 0001");
        old.created_at = Some("2026-01-01T00:00:00Z".to_string());
        create_lead(&db, &old, "admin").expect("create");
        let mut newer = payload("New", "(555) 0001");
        newer.created_at = Some("2026-02-01T00:00:00Z".to_string());
        create_lead(&db, &newer, "admin").expect("create");
        create_lead(&db, &payload("NoPhone", ""), "admin").expect("create");

        let listed = list_leads(&db, &LeadFilter::default()).expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|l| l.name == "New"));
        assert!(listed.iter().all(|l| l.name != "Old"));
    }

    #[test]
    fn test_won_leads_include_legacy_alias() {
        let db = test_db();
        let mut p = payload("Winner", "1");
        p.stage = Some("Won".to_string());
        create_lead(&db, &p, "admin").expect("create");
        create_lead(&db, &payload("Fresh", "2"), "admin").expect("create");

        let won = won_leads(&db).expect("won");
        assert_eq!(won.len(), 1);
        assert_eq!(won[0].name, "Winner");
    }
}
