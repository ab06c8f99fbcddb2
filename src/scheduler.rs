//! Stage transitions and call logging, plus the follow-up bookkeeping they
//! trigger.
//!
//! A stage change records old/new values on the lead's timeline and, when
//! the lead has been called at least once and the new stage still wants
//! follow-up, recomputes the next-follow-up timestamp from the most recent
//! call. Logging a call persists the call record and schedules the next
//! follow-up from the call's own timestamp, with an explicit override on the
//! call taking precedence over the interval table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{activity, CrmDb, DbCall, DbLead};
use crate::error::{CrmError, CrmResult};
use crate::leads::canonical_stage;
use crate::stage::{self, label_is_terminal};
use crate::util;

/// Incoming call fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallPayload {
    pub lead_id: String,
    pub caller_id: Option<String>,
    pub call_type: Option<String>,
    pub duration_secs: Option<i64>,
    pub notes: Option<String>,
    /// Explicit next-follow-up override. Wins over the interval table.
    pub next_follow_up: Option<String>,
    pub created_at: Option<String>,
}

/// Move a lead to a new stage.
///
/// Always emits a `stage_changed` activity. The follow-up date is only
/// recomputed when the new stage has an interval and at least one call
/// exists; a terminal stage clears any stored follow-up instead.
pub fn record_stage_change(
    db: &CrmDb,
    lead_id: &str,
    new_stage: &str,
    actor: &str,
) -> CrmResult<DbLead> {
    if new_stage.is_empty() {
        return Err(CrmError::InvalidInput("stage is required".to_string()));
    }
    let new_stage = canonical_stage(new_stage);

    let mut lead = db
        .get_lead(lead_id)?
        .ok_or_else(|| CrmError::NotFound("lead", lead_id.to_string()))?;
    if lead.stage == new_stage {
        return Ok(lead);
    }

    let old_stage = lead.stage.clone();
    db.set_lead_stage(lead_id, &new_stage)?;
    lead.stage = new_stage.clone();

    if let Err(e) = db.insert_activity(
        lead_id,
        activity::STAGE_CHANGED,
        &format!("Stage changed from '{old_stage}' to '{new_stage}'"),
        actor,
        Some(&old_stage),
        Some(&new_stage),
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to record stage change activity for lead {lead_id}: {e}");
    }

    if label_is_terminal(&new_stage) {
        if lead.next_follow_up.is_some() {
            db.set_lead_next_follow_up(lead_id, None)?;
            lead.next_follow_up = None;
        }
    } else if let Some(last_call) = db.last_call_for_lead(lead_id)? {
        let last_call_at = util::parse_timestamp_lenient(Some(&last_call.created_at));
        if let Some(due) = stage::next_follow_up(Some(last_call_at), &new_stage) {
            schedule_follow_up(db, &mut lead, due, actor)?;
        }
    }

    Ok(lead)
}

/// Log a call against a lead and schedule the next follow-up.
pub fn log_call(db: &CrmDb, payload: &CallPayload, actor: &str) -> CrmResult<DbCall> {
    let mut lead = db
        .get_lead(&payload.lead_id)?
        .ok_or_else(|| CrmError::NotFound("lead", payload.lead_id.clone()))?;

    let duration_secs = payload.duration_secs.unwrap_or(0);
    if duration_secs < 0 {
        return Err(CrmError::InvalidInput(
            "call duration cannot be negative".to_string(),
        ));
    }

    let (caller_id, caller_name) = match &payload.caller_id {
        Some(id) => {
            let caller = db
                .get_caller(id)?
                .ok_or_else(|| CrmError::NotFound("caller", id.clone()))?;
            let name = caller.display_name().to_string();
            (Some(caller.id), Some(name))
        }
        None => (None, None),
    };

    let call_type = match &payload.call_type {
        Some(t) if !t.is_empty() => t.clone(),
        _ => db.default_call_type()?,
    };
    let created_at = util::parse_timestamp_lenient(payload.created_at.as_deref());

    let call = DbCall {
        id: util::new_id(),
        lead_id: lead.id.clone(),
        caller_id,
        caller_name,
        call_type: call_type.clone(),
        duration_secs,
        notes: payload.notes.clone().unwrap_or_default(),
        next_follow_up: payload.next_follow_up.clone(),
        created_at: util::to_rfc3339(created_at),
    };
    db.insert_call(&call)?;

    if let Err(e) = db.insert_activity(
        &call.lead_id,
        activity::CALL,
        &format!("{call_type} call logged ({duration_secs}s)"),
        actor,
        None,
        None,
        &call.created_at,
    ) {
        log::warn!("Failed to record call activity for lead {}: {e}", call.lead_id);
    }

    // Explicit override wins; otherwise derive from the call time and the
    // lead's current stage.
    let due = match &payload.next_follow_up {
        Some(raw) => Some(util::parse_timestamp_lenient(Some(raw))),
        None => stage::next_follow_up(Some(created_at), &lead.stage),
    };
    if let Some(due) = due {
        schedule_follow_up(db, &mut lead, due, actor)?;
    }

    Ok(call)
}

/// Persist a follow-up date and note it on the timeline.
fn schedule_follow_up(
    db: &CrmDb,
    lead: &mut DbLead,
    due: DateTime<Utc>,
    actor: &str,
) -> CrmResult<()> {
    let due_text = util::to_rfc3339(due);
    db.set_lead_next_follow_up(&lead.id, Some(&due_text))?;
    lead.next_follow_up = Some(due_text.clone());

    if let Err(e) = db.insert_activity(
        &lead.id,
        activity::FOLLOW_UP_SCHEDULED,
        &format!("Next follow-up scheduled for {due_text}"),
        actor,
        None,
        Some(&due_text),
        &util::now_rfc3339(),
    ) {
        log::warn!("Failed to record follow-up activity for lead {}: {e}", lead.id);
    }
    Ok(())
}
