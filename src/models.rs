use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub(crate) enum CheckType {
    Site,
    #[default]
    Service,
}

impl From<String> for CheckType {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("site") {
            CheckType::Site
        } else {
            CheckType::Service
        }
    }
}

impl From<CheckType> for String {
    fn from(value: CheckType) -> Self {
        match value {
            CheckType::Site => "site".to_string(),
            CheckType::Service => "service".to_string(),
        }
    }
}

/// A downtime record as the monitoring backend reports it.
///
/// `start_time` is `None` when the backend sent a missing or unparseable
/// start, or an `end_time` that is present but unparseable; such events are
/// skipped by the engine. Only an absent, null or empty `end_time` marks the
/// event as ongoing.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(from = "RawDowntimeEvent")]
pub(crate) struct DowntimeEvent {
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) check_type: CheckType,
    pub(crate) domain_name: Option<String>,
    pub(crate) endpoint: Option<String>,
    pub(crate) member_name: String,
}

impl DowntimeEvent {
    pub(crate) fn target(&self) -> Option<&str> {
        self.domain_name
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or(self.endpoint.as_deref())
    }

    pub(crate) fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Wire shape of a downtime event; every field may be missing or null.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDowntimeEvent {
    start_time: Option<serde_json::Value>,
    end_time: Option<serde_json::Value>,
    check_type: Option<String>,
    domain_name: Option<String>,
    endpoint: Option<String>,
    member_name: Option<String>,
}

impl From<RawDowntimeEvent> for DowntimeEvent {
    fn from(raw: RawDowntimeEvent) -> Self {
        let (end_time, end_valid) = match raw.end_time {
            None | Some(serde_json::Value::Null) => (None, true),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => (None, true),
            Some(value) => match timestamp_value(&value) {
                Some(end) => (Some(end), true),
                None => (None, false),
            },
        };
        let start_time = raw
            .start_time
            .as_ref()
            .and_then(timestamp_value)
            .filter(|_| end_valid);

        DowntimeEvent {
            start_time,
            end_time,
            check_type: raw.check_type.map(CheckType::from).unwrap_or_default(),
            domain_name: raw.domain_name,
            endpoint: raw.endpoint,
            member_name: raw.member_name.unwrap_or_default(),
        }
    }
}

fn timestamp_value(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp)
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Backend timestamps without an offset are UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct MemberRecord {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) services: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ServiceCost {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) base_cost: Option<f64>,
    #[serde(default)]
    pub(crate) active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct MemberBreakdown {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) services: Vec<ServiceCost>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub(crate) struct BillingBreakdown {
    #[serde(default)]
    pub(crate) members: Vec<MemberBreakdown>,
}

/// Service names of one member, unique case-insensitively, in first-seen
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServiceInventory {
    names: Vec<String>,
}

impl ServiceInventory {
    pub(crate) fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inventory = Self::default();
        for name in names {
            inventory.insert(name.as_ref());
        }
        inventory
    }

    pub(crate) fn insert(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && self.position(name).is_none() {
            self.names.push(name.to_string());
        }
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.names.retain(|n| !n.eq_ignore_ascii_case(name.trim()));
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct EvaluationWindow {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
}

impl EvaluationWindow {
    pub(crate) fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub(crate) fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    pub(crate) fn duration_millis(&self) -> i64 {
        (self.end - self.start).num_milliseconds().max(0)
    }

    pub(crate) fn duration_hours(&self) -> f64 {
        self.duration_millis() as f64 / MILLIS_PER_HOUR
    }
}

pub(crate) const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ServiceResult {
    pub(crate) name: String,
    pub(crate) base_cost: f64,
    pub(crate) uptime_percentage: f64,
    pub(crate) meets_sla: bool,
    pub(crate) credits: f64,
    pub(crate) billed_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MemberBillingRecord {
    pub(crate) member: String,
    pub(crate) total_base_cost: f64,
    pub(crate) total_credits: f64,
    pub(crate) total_billed: f64,
    pub(crate) meets_sla: bool,
    pub(crate) services: Vec<ServiceResult>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MonthlyUptime {
    pub(crate) year: i32,
    pub(crate) month: u32,
    pub(crate) uptime: f64,
    pub(crate) avg_downtime_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MemberReport {
    pub(crate) window: EvaluationWindow,
    pub(crate) now: DateTime<Utc>,
    pub(crate) site_uptime: f64,
    pub(crate) average_service_uptime: f64,
    pub(crate) health: f64,
    pub(crate) status: Status,
    pub(crate) service_status: BTreeMap<String, Status>,
    pub(crate) billing: MemberBillingRecord,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) history: Vec<MonthlyUptime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_with_malformed_start_time_deserializes_as_none() {
        let event: DowntimeEvent = serde_json::from_str(
            r#"{"start_time": "yesterday-ish", "check_type": "site", "member_name": "Acme"}"#,
        )
        .unwrap();
        assert!(event.start_time.is_none());
        assert_eq!(event.check_type, CheckType::Site);
    }

    #[test]
    fn test_event_missing_fields_uses_defaults() {
        let event: DowntimeEvent =
            serde_json::from_str(r#"{"start_time": 1700000000, "member_name": "Acme"}"#).unwrap();
        assert!(event.start_time.is_none());
        assert!(event.end_time.is_none());
        assert_eq!(event.check_type, CheckType::Service);
        assert!(event.target().is_none());
    }

    #[test]
    fn test_unparseable_end_time_rejects_event() {
        let event: DowntimeEvent = serde_json::from_str(
            r#"{"start_time": "2024-04-01T10:00:00Z", "end_time": "2024-04-01 garbage", "member_name": "Acme"}"#,
        )
        .unwrap();
        assert!(event.start_time.is_none());
    }

    #[test]
    fn test_null_or_empty_end_time_means_ongoing() {
        for end in ["null", r#""""#, r#""  ""#] {
            let json = format!(r#"{{"start_time": "2024-04-01T10:00:00Z", "end_time": {}}}"#, end);
            let event: DowntimeEvent = serde_json::from_str(&json).unwrap();
            assert!(event.start_time.is_some(), "end_time {} rejected the event", end);
            assert!(event.is_open());
        }
    }

    #[test]
    fn test_null_check_type_and_member_name_use_defaults() {
        let event: DowntimeEvent = serde_json::from_str(
            r#"{"start_time": "2024-04-01T10:00:00Z", "check_type": null, "member_name": null, "domain_name": null}"#,
        )
        .unwrap();
        assert_eq!(event.check_type, CheckType::Service);
        assert_eq!(event.member_name, "");
        assert!(event.target().is_none());
    }

    #[test]
    fn test_unknown_check_type_is_service() {
        let event: DowntimeEvent = serde_json::from_str(
            r#"{"start_time": "2024-05-01T00:00:00Z", "check_type": "endpoint", "endpoint": "wss://a.example:443"}"#,
        )
        .unwrap();
        assert_eq!(event.check_type, CheckType::Service);
        assert_eq!(event.target(), Some("wss://a.example:443"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00.000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_inventory_is_case_insensitively_unique() {
        let mut inventory = ServiceInventory::new(["Polkadot", "polkadot", " Kusama ", ""]);
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.position("KUSAMA"), Some(1));
        inventory.remove("POLKADOT");
        assert_eq!(inventory.names().collect::<Vec<_>>(), vec!["Kusama"]);
    }

    #[test]
    fn test_degenerate_window() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert!(EvaluationWindow::new(t, t).is_degenerate());
        let w = EvaluationWindow::new(t, t + chrono::Duration::hours(2));
        assert!(!w.is_degenerate());
        assert_eq!(w.duration_hours(), 2.0);
    }
}
