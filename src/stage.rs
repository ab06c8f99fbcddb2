//! Pipeline stages and the follow-up interval table.
//!
//! The stage set is closed: every stage is matched exhaustively wherever
//! follow-up or terminality decisions are made, so adding a stage forces a
//! compile error at each decision point instead of silently falling through
//! a lookup table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A lead's position in the sales pipeline.
///
/// Stored and exchanged as the human-readable label (`"New Lead"`,
/// `"Closed Won"`, …). `Won` and `Lost` are accepted as legacy aliases of
/// the closed stages when parsing, but are never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    NewLead,
    Contacted,
    Interested,
    Negotiation,
    NotInterested,
    ClosedWon,
    ClosedLost,
}

/// Follow-up interval applied to stages we don't recognize. Unknown labels
/// behave like a fresh lead rather than dropping off the follow-up radar.
const DEFAULT_FOLLOW_UP_HOURS: i64 = 24;

impl Stage {
    /// Parse a stage label, accepting the legacy `Won`/`Lost` aliases.
    /// Labels are case-sensitive, matching the wire format.
    pub fn parse(label: &str) -> Option<Stage> {
        match label {
            "New Lead" => Some(Stage::NewLead),
            "Contacted" => Some(Stage::Contacted),
            "Interested" => Some(Stage::Interested),
            "Negotiation" => Some(Stage::Negotiation),
            "Not Interested" => Some(Stage::NotInterested),
            "Closed Won" | "Won" => Some(Stage::ClosedWon),
            "Closed Lost" | "Lost" => Some(Stage::ClosedLost),
            _ => None,
        }
    }

    /// Canonical label for storage and reporting.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::NewLead => "New Lead",
            Stage::Contacted => "Contacted",
            Stage::Interested => "Interested",
            Stage::Negotiation => "Negotiation",
            Stage::NotInterested => "Not Interested",
            Stage::ClosedWon => "Closed Won",
            Stage::ClosedLost => "Closed Lost",
        }
    }

    /// Hours to wait after the last call before the next contact is due.
    /// `None` means the stage never schedules a follow-up.
    pub fn follow_up_interval(&self) -> Option<Duration> {
        match self {
            Stage::NewLead => Some(Duration::hours(24)),
            Stage::Contacted => Some(Duration::hours(48)),
            Stage::Interested => Some(Duration::hours(120)),
            Stage::Negotiation => Some(Duration::hours(72)),
            Stage::NotInterested | Stage::ClosedWon | Stage::ClosedLost => None,
        }
    }

    /// A won deal. Legacy `"Won"` rows parse to `ClosedWon` and count here.
    pub fn is_converted(&self) -> bool {
        matches!(self, Stage::ClosedWon)
    }

    /// Terminal stages leave the active pipeline: no follow-ups, excluded
    /// from the missed-follow-up count.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stage::NotInterested | Stage::ClosedWon | Stage::ClosedLost
        )
    }
}

/// Whether a raw stage label counts as converted (handles legacy aliases).
pub fn label_is_converted(label: &str) -> bool {
    Stage::parse(label).map(|s| s.is_converted()).unwrap_or(false)
}

/// Whether a raw stage label is terminal. Unknown labels are treated as
/// active pipeline stages.
pub fn label_is_terminal(label: &str) -> bool {
    Stage::parse(label).map(|s| s.is_terminal()).unwrap_or(false)
}

/// Follow-up interval for a raw stage label. Unrecognized labels get the
/// default 24-hour interval; recognized terminal stages get `None`.
pub fn interval_for_label(label: &str) -> Option<Duration> {
    match Stage::parse(label) {
        Some(stage) => stage.follow_up_interval(),
        None => Some(Duration::hours(DEFAULT_FOLLOW_UP_HOURS)),
    }
}

/// Compute when the next contact is due.
///
/// Pure: `last_call + interval(stage)` when both exist, otherwise `None`.
/// A lead that has never been called is never scheduled — follow-up cadence
/// only starts once someone has actually reached out.
pub fn next_follow_up(
    last_call: Option<DateTime<Utc>>,
    stage_label: &str,
) -> Option<DateTime<Utc>> {
    let last_call = last_call?;
    let interval = interval_for_label(stage_label)?;
    Some(last_call + interval)
}

/// Funnel stage order used by the analytics pipeline: the forward path from
/// intake to close. Negative/terminal-lost stages are not funnel positions.
pub const FUNNEL_ORDER: [Stage; 5] = [
    Stage::NewLead,
    Stage::Contacted,
    Stage::Interested,
    Stage::Negotiation,
    Stage::ClosedWon,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        crate::util::parse_timestamp(s).expect("ts")
    }

    #[test]
    fn test_parse_accepts_legacy_aliases() {
        assert_eq!(Stage::parse("Won"), Some(Stage::ClosedWon));
        assert_eq!(Stage::parse("Lost"), Some(Stage::ClosedLost));
        assert_eq!(Stage::parse("Closed Won"), Some(Stage::ClosedWon));
        assert_eq!(Stage::parse("won"), None, "labels are case-sensitive");
    }

    #[test]
    fn test_interval_table() {
        assert_eq!(
            Stage::NewLead.follow_up_interval(),
            Some(Duration::hours(24))
        );
        assert_eq!(
            Stage::Contacted.follow_up_interval(),
            Some(Duration::hours(48))
        );
        assert_eq!(
            Stage::Interested.follow_up_interval(),
            Some(Duration::hours(120))
        );
        assert_eq!(
            Stage::Negotiation.follow_up_interval(),
            Some(Duration::hours(72))
        );
        assert_eq!(Stage::NotInterested.follow_up_interval(), None);
        assert_eq!(Stage::ClosedWon.follow_up_interval(), None);
        assert_eq!(Stage::ClosedLost.follow_up_interval(), None);
    }

    #[test]
    fn test_next_follow_up_new_lead_is_24h() {
        let t = at("2026-03-01T10:00:00Z");
        assert_eq!(
            next_follow_up(Some(t), "New Lead"),
            Some(t + Duration::hours(24))
        );
    }

    #[test]
    fn test_next_follow_up_terminal_is_none_regardless_of_call() {
        let t = at("2026-03-01T10:00:00Z");
        assert_eq!(next_follow_up(Some(t), "Closed Won"), None);
        assert_eq!(next_follow_up(Some(t), "Won"), None);
        assert_eq!(next_follow_up(Some(t), "Not Interested"), None);
    }

    #[test]
    fn test_next_follow_up_unknown_stage_defaults_to_24h() {
        let t = at("2026-03-01T10:00:00Z");
        assert_eq!(
            next_follow_up(Some(t), "Proposal Sent"),
            Some(t + Duration::hours(24))
        );
    }

    #[test]
    fn test_next_follow_up_requires_a_call() {
        assert_eq!(next_follow_up(None, "New Lead"), None);
        assert_eq!(next_follow_up(None, "Contacted"), None);
    }

    #[test]
    fn test_label_round_trip() {
        for stage in [
            Stage::NewLead,
            Stage::Contacted,
            Stage::Interested,
            Stage::Negotiation,
            Stage::NotInterested,
            Stage::ClosedWon,
            Stage::ClosedLost,
        ] {
            assert_eq!(Stage::parse(stage.label()), Some(stage));
        }
    }
}
