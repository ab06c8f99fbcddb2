//! Phone-fingerprint deduplication and the per-field merge policy.
//!
//! Two leads are the same contact when their phone numbers normalize to the
//! same digit string. Listings collapse the raw record set down to one lead
//! per fingerprint; import uses the same fingerprint to decide between
//! updating an existing lead and inserting a new one.

use std::collections::HashSet;

use crate::db::DbLead;

/// The deduplication key for a lead. Leads without phone digits get a key
/// synthesized from their own id, so they can never collapse with another
/// record.
pub fn fingerprint_key(lead: &DbLead) -> String {
    if lead.phone_digits.is_empty() {
        format!("no_phone_{}", lead.id)
    } else {
        lead.phone_digits.clone()
    }
}

/// Collapse a newest-first lead sequence to one record per fingerprint.
///
/// Single pass, stable: the first occurrence of each fingerprint wins, so
/// with newest-first input the newest record survives. Empty-fingerprint
/// leads always survive. Pure over the input ordering; no record is mutated.
pub fn dedupe(leads: Vec<DbLead>) -> Vec<DbLead> {
    let mut seen: HashSet<String> = HashSet::with_capacity(leads.len());
    let mut kept = Vec::with_capacity(leads.len());
    for lead in leads {
        if seen.insert(fingerprint_key(&lead)) {
            kept.push(lead);
        }
    }
    kept
}

/// Per-field merge policy for import collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Take the incoming value when present, else keep the existing one.
    PreferIncoming,
    /// Keep the existing value when present, else take the incoming one.
    PreferExisting,
}

impl MergeRule {
    /// Resolve one field. Absent values never overwrite present ones.
    pub fn apply<T>(self, incoming: Option<T>, existing: Option<T>) -> Option<T> {
        match self {
            MergeRule::PreferIncoming => incoming.or(existing),
            MergeRule::PreferExisting => existing.or(incoming),
        }
    }

    /// String fields treat empty as absent.
    pub fn apply_str(self, incoming: Option<&str>, existing: &str) -> String {
        let incoming = incoming.filter(|v| !v.is_empty()).map(str::to_string);
        let existing = Some(existing).filter(|v| !v.is_empty()).map(str::to_string);
        self.apply(incoming, existing).unwrap_or_default()
    }
}
