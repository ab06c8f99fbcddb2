//! Bulk lead import with merge-or-insert semantics.
//!
//! Each row is matched against existing leads by phone fingerprint. A match
//! updates the existing lead field-by-field (incoming value when present,
//! else keep existing); no match inserts a new lead. Freshly inserted leads
//! are rotated to a caller when auto-assignment is enabled.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{activity, CrmDb, DbLead};
use crate::dedupe::MergeRule;
use crate::error::CrmResult;
use crate::leads::{canonical_stage, insert_with_retry, LeadPayload};
use crate::notification::Notifier;
use crate::rotator;
use crate::util;

/// What happened to an import batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub assigned: usize,
    pub skipped: usize,
}

/// Import a batch of lead rows.
///
/// Rows without a name are skipped rather than failing the batch. Merge
/// collisions are resolved per field with `MergeRule::PreferIncoming`.
pub fn import_leads(
    db: &CrmDb,
    rows: &[LeadPayload],
    actor: &str,
    notifier: Arc<dyn Notifier>,
) -> CrmResult<ImportSummary> {
    let auto_assign = db.auto_assign_new_leads()?;
    let mut summary = ImportSummary {
        total: rows.len(),
        ..Default::default()
    };

    for row in rows {
        if row
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .is_none()
        {
            log::warn!("Skipping import row without a name");
            summary.skipped += 1;
            continue;
        }

        let fingerprint = util::digits_only(row.phone.as_deref().unwrap_or(""));
        match db.find_lead_by_fingerprint(&fingerprint)? {
            Some(existing) => {
                merge_into(db, existing, row, actor)?;
                summary.updated += 1;
            }
            None => {
                let lead = insert_row(db, row, actor)?;
                summary.inserted += 1;
                if auto_assign
                    && rotator::auto_assign(db, &lead.id, actor, notifier.clone())?.is_some()
                {
                    summary.assigned += 1;
                }
            }
        }
    }

    log::info!(
        "Import finished: {} rows, {} inserted, {} updated, {} assigned, {} skipped",
        summary.total,
        summary.inserted,
        summary.updated,
        summary.assigned,
        summary.skipped
    );
    Ok(summary)
}

/// Merge an import row into an existing lead with the same fingerprint.
fn merge_into(db: &CrmDb, mut lead: DbLead, row: &LeadPayload, actor: &str) -> CrmResult<()> {
    let rule = MergeRule::PreferIncoming;
    lead.name = rule.apply_str(row.name.as_deref(), &lead.name);
    lead.phone = rule.apply_str(row.phone.as_deref(), &lead.phone);
    lead.phone_digits = util::digits_only(&lead.phone);
    lead.email = rule.apply_str(row.email.as_deref(), &lead.email);
    lead.city = rule.apply_str(row.city.as_deref(), &lead.city);
    lead.source = rule.apply_str(row.source.as_deref(), &lead.source);
    lead.priority = rule.apply_str(row.priority.as_deref(), &lead.priority);
    if let Some(value) = row.value {
        lead.value = value;
    }
    if let Some(stage) = row.stage.as_deref().filter(|s| !s.is_empty()) {
        lead.stage = canonical_stage(stage);
    }
    db.update_lead(&lead)?;

    if let Err(e) = db.insert_activity(
        &lead.id,
        activity::LEAD_IMPORTED,
        "Updated from import",
        actor,
        None,
        None,
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to record import activity for lead {}: {e}", lead.id);
    }
    Ok(())
}

/// Insert an import row as a new lead.
fn insert_row(db: &CrmDb, row: &LeadPayload, actor: &str) -> CrmResult<DbLead> {
    let phone = row.phone.clone().unwrap_or_default();
    let stage = match row.stage.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => canonical_stage(s),
        None => db.default_lead_stage()?,
    };
    let created_at = util::parse_timestamp_lenient(row.created_at.as_deref());

    let lead = insert_with_retry(
        db,
        DbLead {
            id: row
                .id
                .as_deref()
                .and_then(util::valid_lead_id)
                .unwrap_or_else(util::new_id),
            name: row.name.clone().unwrap_or_default().trim().to_string(),
            phone_digits: util::digits_only(&phone),
            phone,
            email: row.email.clone().unwrap_or_default(),
            city: row.city.clone().unwrap_or_default(),
            value: row.value.unwrap_or(0.0),
            source: row.source.clone().unwrap_or_default(),
            stage,
            priority: row.priority.clone().unwrap_or_else(|| "Warm".to_string()),
            assigned_caller: None,
            assigned_caller_name: None,
            assigned_at: None,
            next_follow_up: None,
            not_interested_reason: None,
            not_interested_note: None,
            created_at: util::to_rfc3339(created_at),
        },
    )?;

    if let Err(e) = db.insert_activity(
        &lead.id,
        activity::LEAD_IMPORTED,
        &format!("Lead '{}' created from import", lead.name),
        actor,
        None,
        None,
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to record import activity for lead {}: {e}", lead.id);
    }
    Ok(lead)
}
