//! Round-robin caller assignment over the persisted cursor.
//!
//! The cursor lives in the settings table and is advanced with a single
//! atomic increment-and-fetch, so concurrent assignments never pick from the
//! same cursor position. Selection order is the callers' stable creation
//! order; only Active callers participate.

use std::sync::Arc;

use crate::db::{activity, CrmDb, DbCaller, DbLead};
use crate::error::{CrmError, CrmResult};
use crate::notification::{self, AssignmentNotice, Notifier};
use crate::util;

/// Pick the next Active caller in rotation and advance the cursor.
///
/// With zero Active callers this returns `NoCallersAvailable` and leaves the
/// cursor untouched.
pub fn select_next_caller(db: &CrmDb) -> CrmResult<DbCaller> {
    let active = db.get_active_callers()?;
    if active.is_empty() {
        return Err(CrmError::NoCallersAvailable);
    }
    let cursor = db.next_assignment_cursor()?;
    let index = (cursor % active.len() as i64) as usize;
    Ok(active[index].clone())
}

/// Assign a lead to a caller: persist the assignment, note it on the
/// timeline and in the audit log, and notify the caller.
///
/// The notification is dispatched after the assignment is durable and runs
/// on its own thread; its failure never unwinds the assignment. Activity and
/// audit writes are secondary too: a miss is logged and the assignment
/// stands.
pub fn assign_lead(
    db: &CrmDb,
    lead_id: &str,
    caller: &DbCaller,
    actor: &str,
    notifier: Arc<dyn Notifier>,
) -> CrmResult<DbLead> {
    let mut lead = db
        .get_lead(lead_id)?
        .ok_or_else(|| CrmError::NotFound("lead", lead_id.to_string()))?;

    let assigned_at = util::now_rfc3339();
    let caller_name = caller.display_name().to_string();
    db.set_lead_assignment(lead_id, &caller.id, &caller_name, &assigned_at)?;
    lead.assigned_caller = Some(caller.id.clone());
    lead.assigned_caller_name = Some(caller_name.clone());
    lead.assigned_at = Some(assigned_at.clone());

    if let Err(e) = db.insert_activity(
        lead_id,
        activity::ASSIGNED,
        &format!("Assigned to {caller_name}"),
        actor,
        None,
        Some(&caller.id),
        &assigned_at,
    ) {
        log::warn!("Failed to record assignment activity for lead {lead_id}: {e}");
    }
    if let Err(e) = db.insert_audit(
        "lead_assigned",
        actor,
        lead_id,
        &format!("Assigned to caller {} ({caller_name})", caller.id),
        &assigned_at,
    ) {
        log::warn!("Failed to audit assignment of lead {lead_id}: {e}");
    }

    notification::dispatch(notifier, AssignmentNotice::new(caller, &lead));

    Ok(lead)
}

/// Rotate a lead to the next caller. A drained roster skips assignment
/// rather than failing the surrounding create/import.
pub fn auto_assign(
    db: &CrmDb,
    lead_id: &str,
    actor: &str,
    notifier: Arc<dyn Notifier>,
) -> CrmResult<Option<DbCaller>> {
    match select_next_caller(db) {
        Ok(caller) => {
            assign_lead(db, lead_id, &caller, actor, notifier)?;
            Ok(Some(caller))
        }
        Err(CrmError::NoCallersAvailable) => {
            log::info!("No active callers, lead {lead_id} left unassigned");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Manual assignment to a specific caller, bypassing the rotation.
pub fn assign_to_caller(
    db: &CrmDb,
    lead_id: &str,
    caller_id: &str,
    actor: &str,
    notifier: Arc<dyn Notifier>,
) -> CrmResult<DbLead> {
    let caller = db
        .get_caller(caller_id)?
        .ok_or_else(|| CrmError::NotFound("caller", caller_id.to_string()))?;
    assign_lead(db, lead_id, &caller, actor, notifier)
}
