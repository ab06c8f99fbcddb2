//! Small shared helpers: phone normalization, timestamp handling, id validation.

use chrono::{DateTime, SecondsFormat, Utc};

/// Strip a phone number down to its digits.
///
/// The digit string is the deduplication fingerprint for a lead: two raw
/// phone values that normalize to the same digits are the same contact.
/// Empty input (or input with no digits) yields an empty fingerprint, which
/// never participates in deduplication.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Current UTC time as RFC 3339 with whole-second precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a timestamp the way the store expects it.
pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO-8601-ish timestamp, tolerating a trailing `Z`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a client-supplied timestamp, substituting "now" when it is missing
/// or malformed. Intake payloads come from spreadsheets and imports; a bad
/// `createdAt` should not fail the whole row.
pub fn parse_timestamp_lenient(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(parse_timestamp).unwrap_or_else(Utc::now)
}

/// Validate a client-supplied lead identifier. Only well-formed UUIDs are
/// reused; anything else gets a freshly generated id.
pub fn valid_lead_id(raw: &str) -> Option<String> {
    uuid::Uuid::parse_str(raw.trim())
        .ok()
        .map(|u| u.to_string())
}

/// Generate a fresh lead/record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_only_strips_formatting() {
        assert_eq!(digits_only("+91 (555) 123-4567"), "915551234567");
        assert_eq!(digits_only("555.1234"), "5551234");
        assert_eq!(digits_only(""), "");
        assert_eq!(digits_only("n/a"), "");
    }

    #[test]
    fn test_parse_timestamp_accepts_z_suffix() {
        let dt = parse_timestamp("2026-03-01T10:30:00Z").expect("parse");
        assert_eq!(to_rfc3339(dt), "2026-03-01T10:30:00Z");
    }

    #[test]
    fn test_timestamp_round_trips_whole_seconds() {
        let raw = "2026-03-01T10:30:45Z";
        let dt = parse_timestamp(raw).expect("parse");
        assert_eq!(to_rfc3339(dt), raw);
    }

    #[test]
    fn test_lenient_parse_substitutes_now() {
        let before = Utc::now();
        let parsed = parse_timestamp_lenient(Some("not-a-date"));
        assert!(parsed >= before);

        let parsed = parse_timestamp_lenient(None);
        assert!(parsed >= before);
    }

    #[test]
    fn test_valid_lead_id() {
        assert_eq!(
            valid_lead_id(" 550e8400-e29b-41d4-a716-446655440000 "),
            Some("550e8400-e29b-41d4-a716-446655440000".to_string())
        );
        assert!(valid_lead_id("lead-42").is_none());
        assert!(valid_lead_id("").is_none());
    }
}
