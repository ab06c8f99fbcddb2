//! Read-only reporting over the deduplicated lead set and call history.
//!
//! Every derivation here is a pure function of the records it is given plus
//! an explicit `now`; nothing is written back. Rates are defined as 0 over
//! empty sets, never a division error.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{CrmDb, DbCall, DbLead};
use crate::dedupe;
use crate::error::CrmResult;
use crate::stage::{self, label_is_converted, label_is_terminal, Stage, FUNNEL_ORDER};
use crate::util;

/// Optional creation-date range and source filter applied before any
/// aggregation.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl ReportFilter {
    fn matches(&self, lead: &DbLead) -> bool {
        if let Some(source) = &self.source {
            if &lead.source != source {
                return false;
            }
        }
        let created = match util::parse_timestamp(&lead.created_at) {
            Some(ts) => ts,
            None => return self.from.is_none() && self.to.is_none(),
        };
        if let Some(from) = self.from {
            if created < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if created > to {
                return false;
            }
        }
        true
    }
}

/// The deduplicated, filtered lead set every report derives from.
pub fn filtered_leads(db: &CrmDb, filter: &ReportFilter) -> CrmResult<Vec<DbLead>> {
    let mut leads = dedupe::dedupe(db.get_all_leads()?);
    leads.retain(|l| filter.matches(l));
    Ok(leads)
}

// =============================================================================
// Funnel
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStage {
    pub stage: String,
    pub count: usize,
    pub total_value: f64,
    /// Percentage of the previous stage's population (total set for the
    /// first stage).
    pub conversion_rate: f64,
    pub drop_off: f64,
    pub avg_days_in_stage: i64,
}

fn percent(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64 * 100.0
    }
}

/// Stage-by-stage funnel over the forward pipeline path.
pub fn funnel(leads: &[DbLead], now: DateTime<Utc>) -> Vec<FunnelStage> {
    let mut per_stage: HashMap<Stage, Vec<&DbLead>> = HashMap::new();
    for lead in leads {
        if let Some(stage) = Stage::parse(&lead.stage) {
            per_stage.entry(stage).or_default().push(lead);
        }
    }

    let mut out = Vec::with_capacity(FUNNEL_ORDER.len());
    let mut prev_count = leads.len();
    for (i, stage) in FUNNEL_ORDER.iter().enumerate() {
        let members: &[&DbLead] = per_stage.get(stage).map(Vec::as_slice).unwrap_or(&[]);
        let count = members.len();
        let total_value: f64 = members.iter().map(|l| l.value).sum();

        let conversion_rate = percent(count, prev_count);
        let terminal = i == FUNNEL_ORDER.len() - 1;
        let drop_off = if terminal { 0.0 } else { 100.0 - conversion_rate };

        let total_days: i64 = members
            .iter()
            .filter_map(|l| util::parse_timestamp(&l.created_at))
            .map(|created| (now - created).num_days())
            .sum();
        let avg_days_in_stage = if count == 0 {
            0
        } else {
            total_days / count as i64
        };

        out.push(FunnelStage {
            stage: stage.label().to_string(),
            count,
            total_value,
            conversion_rate,
            drop_off,
            avg_days_in_stage,
        });
        prev_count = count;
    }
    out
}

// =============================================================================
// Source and team performance
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePerformance {
    pub source: String,
    pub total: usize,
    pub converted: usize,
    pub conversion_rate: f64,
    pub total_value: f64,
    /// Mean value of converted deals; 0 without conversions.
    pub avg_deal_value: f64,
}

pub fn source_performance(leads: &[DbLead]) -> Vec<SourcePerformance> {
    let mut by_source: HashMap<String, Vec<&DbLead>> = HashMap::new();
    for lead in leads {
        let source = if lead.source.is_empty() {
            "Unknown".to_string()
        } else {
            lead.source.clone()
        };
        by_source.entry(source).or_default().push(lead);
    }

    let mut out: Vec<SourcePerformance> = by_source
        .into_iter()
        .map(|(source, members)| {
            let total = members.len();
            let converted_leads: Vec<&&DbLead> = members
                .iter()
                .filter(|l| label_is_converted(&l.stage))
                .collect();
            let converted = converted_leads.len();
            let converted_value: f64 = converted_leads.iter().map(|l| l.value).sum();
            SourcePerformance {
                source,
                total,
                converted,
                conversion_rate: percent(converted, total),
                total_value: members.iter().map(|l| l.value).sum(),
                avg_deal_value: if converted == 0 {
                    0.0
                } else {
                    converted_value / converted as f64
                },
            }
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.source.cmp(&b.source)));
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPerformance {
    pub member: String,
    /// Leads owned by this member, which is what "calls handled" means in
    /// this report.
    pub leads_assigned: usize,
    pub conversions: usize,
    pub conversion_rate: f64,
}

/// Per-caller performance, grouped by display name, plus an "Unassigned"
/// bucket for ownerless leads. All buckets share the same rate formula.
pub fn team_performance(leads: &[DbLead]) -> Vec<TeamPerformance> {
    let mut by_member: HashMap<String, Vec<&DbLead>> = HashMap::new();
    for lead in leads {
        // Ownership is the caller id; the display name only labels the bucket
        let member = match &lead.assigned_caller {
            Some(caller_id) => lead
                .assigned_caller_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| caller_id.clone()),
            None => "Unassigned".to_string(),
        };
        by_member.entry(member).or_default().push(lead);
    }

    let mut out: Vec<TeamPerformance> = by_member
        .into_iter()
        .map(|(member, members)| {
            let leads_assigned = members.len();
            let conversions = members
                .iter()
                .filter(|l| label_is_converted(&l.stage))
                .count();
            TeamPerformance {
                member,
                leads_assigned,
                conversions,
                conversion_rate: percent(conversions, leads_assigned),
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.leads_assigned
            .cmp(&a.leads_assigned)
            .then_with(|| a.member.cmp(&b.member))
    });
    out
}

// =============================================================================
// Time series
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub bucket: String,
    pub count: i64,
}

fn day_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn month_key(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Trailing 7-day window, oldest bucket first, pre-seeded with zeros.
/// Timestamps outside the window are dropped silently.
fn daily_series<'a>(
    timestamps: impl Iterator<Item = &'a str>,
    now: DateTime<Utc>,
) -> Vec<TimePoint> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    let mut order = Vec::with_capacity(7);
    for i in (0..7).rev() {
        let key = day_key(now - Duration::days(i));
        counts.insert(key.clone(), 0);
        order.push(key);
    }
    for raw in timestamps {
        if let Some(ts) = util::parse_timestamp(raw) {
            if let Some(slot) = counts.get_mut(&day_key(ts)) {
                *slot += 1;
            }
        }
    }
    order
        .into_iter()
        .map(|bucket| {
            let count = counts[&bucket];
            TimePoint { bucket, count }
        })
        .collect()
}

/// Leads created per day over the trailing week.
pub fn leads_by_day(leads: &[DbLead], now: DateTime<Utc>) -> Vec<TimePoint> {
    daily_series(leads.iter().map(|l| l.created_at.as_str()), now)
}

/// Calls logged per day over the trailing week.
pub fn calls_by_day(calls: &[DbCall], now: DateTime<Utc>) -> Vec<TimePoint> {
    daily_series(calls.iter().map(|c| c.created_at.as_str()), now)
}

/// Won deals per calendar month over the trailing 12 months, oldest first.
/// Buckets step whole calendar months, not 30-day approximations.
pub fn closures_by_month(leads: &[DbLead], now: DateTime<Utc>) -> Vec<TimePoint> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    let mut order = Vec::with_capacity(12);
    let (mut year, mut month) = (now.year(), now.month());
    let mut keys_newest_first = Vec::with_capacity(12);
    for _ in 0..12 {
        keys_newest_first.push(month_key(year, month));
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    for key in keys_newest_first.into_iter().rev() {
        counts.insert(key.clone(), 0);
        order.push(key);
    }

    for lead in leads.iter().filter(|l| label_is_converted(&l.stage)) {
        if let Some(ts) = util::parse_timestamp(&lead.created_at) {
            if let Some(slot) = counts.get_mut(&month_key(ts.year(), ts.month())) {
                *slot += 1;
            }
        }
    }

    order
        .into_iter()
        .map(|bucket| {
            let count = counts[&bucket];
            TimePoint { bucket, count }
        })
        .collect()
}

// =============================================================================
// Follow-up tracking
// =============================================================================

/// Leads whose next contact is already due: non-terminal stage, at least one
/// call, and a computed follow-up in the past.
pub fn missed_follow_ups(
    db: &CrmDb,
    leads: &[DbLead],
    now: DateTime<Utc>,
) -> CrmResult<usize> {
    let mut missed = 0;
    for lead in leads.iter().filter(|l| !label_is_terminal(&l.stage)) {
        if let Some(last_call) = db.last_call_for_lead(&lead.id)? {
            let called_at = util::parse_timestamp_lenient(Some(&last_call.created_at));
            if let Some(due) = stage::next_follow_up(Some(called_at), &lead.stage) {
                if due < now {
                    missed += 1;
                }
            }
        }
    }
    Ok(missed)
}

/// Dashboard follow-up breakdown: won deals are done, lost deals are missed,
/// everything else splits by whether its computed follow-up is still ahead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpStatus {
    pub pending: usize,
    pub done: usize,
    pub missed: usize,
    pub overdue: usize,
}

pub fn follow_up_status(
    db: &CrmDb,
    leads: &[DbLead],
    now: DateTime<Utc>,
) -> CrmResult<FollowUpStatus> {
    let mut status = FollowUpStatus::default();
    for lead in leads {
        match Stage::parse(&lead.stage) {
            Some(Stage::ClosedWon) => status.done += 1,
            Some(Stage::ClosedLost) => status.missed += 1,
            _ => match db.last_call_for_lead(&lead.id)? {
                Some(last_call) => {
                    let called_at = util::parse_timestamp_lenient(Some(&last_call.created_at));
                    match stage::next_follow_up(Some(called_at), &lead.stage) {
                        Some(due) if due < now => status.overdue += 1,
                        Some(_) => status.pending += 1,
                        // No follow-up defined for this stage: nothing left to do
                        None => status.done += 1,
                    }
                }
                None => status.pending += 1,
            },
        }
    }
    Ok(status)
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_leads: usize,
    /// Leads with at least one logged call.
    pub leads_contacted: usize,
    pub leads_converted: usize,
    pub missed_follow_ups: usize,
    pub total_calls: i64,
    /// Open deals: neither won nor lost.
    pub active_deals: usize,
    /// Summed value of open deals.
    pub pipeline_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub kpis: DashboardKpis,
    pub follow_up_status: FollowUpStatus,
    pub funnel: Vec<FunnelStage>,
    pub source_performance: Vec<SourcePerformance>,
    pub team_performance: Vec<TeamPerformance>,
    pub leads_by_day: Vec<TimePoint>,
    pub calls_by_day: Vec<TimePoint>,
    pub closures_by_month: Vec<TimePoint>,
}

/// Assemble the full dashboard for a filter, as of `now`.
pub fn dashboard(db: &CrmDb, filter: &ReportFilter, now: DateTime<Utc>) -> CrmResult<Dashboard> {
    let leads = filtered_leads(db, filter)?;
    let week_ago = util::to_rfc3339(now - Duration::days(7));
    let recent_calls = db.get_calls_since(&week_ago)?;

    let mut leads_contacted = 0;
    for lead in &leads {
        if db.last_call_for_lead(&lead.id)?.is_some() {
            leads_contacted += 1;
        }
    }

    let is_open = |l: &DbLead| {
        !matches!(
            Stage::parse(&l.stage),
            Some(Stage::ClosedWon) | Some(Stage::ClosedLost)
        )
    };
    let kpis = DashboardKpis {
        total_leads: leads.len(),
        leads_contacted,
        leads_converted: leads.iter().filter(|l| label_is_converted(&l.stage)).count(),
        missed_follow_ups: missed_follow_ups(db, &leads, now)?,
        total_calls: db.count_calls()?,
        active_deals: leads.iter().filter(|l| is_open(l)).count(),
        pipeline_value: leads.iter().filter(|l| is_open(l)).map(|l| l.value).sum(),
    };

    Ok(Dashboard {
        follow_up_status: follow_up_status(db, &leads, now)?,
        funnel: funnel(&leads, now),
        source_performance: source_performance(&leads),
        team_performance: team_performance(&leads),
        leads_by_day: leads_by_day(&leads, now),
        calls_by_day: calls_by_day(&recent_calls, now),
        closures_by_month: closures_by_month(&leads, now),
        kpis,
    })
}
