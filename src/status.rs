use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DowntimeEvent, EvaluationWindow, ServiceInventory};
use crate::uptime::{Attribution, UptimeEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Status {
    Operational,
    Degraded,
    Offline,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Operational => write!(f, "operational"),
            Status::Degraded => write!(f, "degraded"),
            Status::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CurrentStatus {
    pub(crate) down_services: BTreeSet<String>,
    pub(crate) site_down: bool,
    pub(crate) health: f64,
    pub(crate) status: Status,
}

/// Which services are down at `now`, derived from open events only.
pub(crate) fn current_status(
    engine: &UptimeEngine,
    events: &[DowntimeEvent],
    inventory: &ServiceInventory,
    now: DateTime<Utc>,
) -> CurrentStatus {
    let active = engine.active_at(events, inventory, now);
    let site_down = active.iter().any(|a| *a == Attribution::Site);

    let down_services: BTreeSet<String> = if site_down {
        inventory.names().map(str::to_string).collect()
    } else {
        active
            .into_iter()
            .filter_map(|a| match a {
                Attribution::Service(name) => Some(name),
                Attribution::Site => None,
            })
            .collect()
    };

    let health = if inventory.is_empty() {
        100.0
    } else {
        (inventory.len() - down_services.len()) as f64 / inventory.len() as f64 * 100.0
    };

    let status = if site_down || (!inventory.is_empty() && health == 0.0) {
        Status::Offline
    } else if health < 100.0 {
        Status::Degraded
    } else {
        Status::Operational
    };

    CurrentStatus {
        down_services,
        site_down,
        health,
        status,
    }
}

/// `Offline` while down, `Degraded` if the service had any downtime in the
/// window, otherwise `Operational`.
pub(crate) fn service_status(
    engine: &UptimeEngine,
    current: &CurrentStatus,
    events: &[DowntimeEvent],
    window: &EvaluationWindow,
    inventory: &ServiceInventory,
    service: &str,
    now: DateTime<Utc>,
) -> Status {
    if current.site_down || current.down_services.iter().any(|s| s.eq_ignore_ascii_case(service)) {
        return Status::Offline;
    }
    let had_downtime = engine
        .attribute(events, inventory, window, now)
        .iter()
        .any(|d| d.affects(service) && d.interval.clamp_to(window).is_some());
    if had_downtime {
        Status::Degraded
    } else {
        Status::Operational
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicySettings;
    use crate::models::CheckType;
    use chrono::{Duration, TimeZone};

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn event(check_type: CheckType, domain: Option<&str>, start: i64, end: Option<i64>) -> DowntimeEvent {
        DowntimeEvent {
            start_time: Some(at(start)),
            end_time: end.map(at),
            check_type,
            domain_name: domain.map(str::to_string),
            endpoint: None,
            member_name: "Acme".to_string(),
        }
    }

    fn setup() -> (UptimeEngine, ServiceInventory, EvaluationWindow) {
        (
            UptimeEngine::new(&PolicySettings::default()),
            ServiceInventory::new(["Polkadot", "Kusama"]),
            EvaluationWindow::new(at(0), at(48)),
        )
    }

    #[test]
    fn test_open_site_event_takes_member_offline() {
        let (engine, inventory, _) = setup();
        let events = vec![event(CheckType::Site, None, 5, None)];
        let current = current_status(&engine, &events, &inventory, at(10));
        assert!(current.site_down);
        assert_eq!(current.status, Status::Offline);
        assert_eq!(current.health, 0.0);
    }

    #[test]
    fn test_single_open_service_event_degrades_member() {
        let (engine, inventory, window) = setup();
        let events = vec![
            event(CheckType::Service, Some("kusama.ibp.network"), 5, None),
            event(CheckType::Service, Some("polkadot.ibp.network"), 1, Some(2)),
        ];
        let now = at(10);
        let current = current_status(&engine, &events, &inventory, now);
        assert_eq!(current.status, Status::Degraded);
        assert_eq!(current.health, 50.0);
        assert_eq!(
            service_status(&engine, &current, &events, &window, &inventory, "Kusama", now),
            Status::Offline
        );
        assert_eq!(
            service_status(&engine, &current, &events, &window, &inventory, "Polkadot", now),
            Status::Degraded
        );
    }

    #[test]
    fn test_closed_events_leave_member_operational() {
        let (engine, inventory, window) = setup();
        let events = vec![event(CheckType::Site, None, 1, Some(3))];
        let current = current_status(&engine, &events, &inventory, at(10));
        assert_eq!(current.status, Status::Operational);
        assert_eq!(current.health, 100.0);
        let outside = EvaluationWindow::new(at(20), at(48));
        assert_eq!(
            service_status(&engine, &current, &events, &outside, &inventory, "Kusama", at(30)),
            Status::Operational
        );
        assert_eq!(
            service_status(&engine, &current, &events, &window, &inventory, "Kusama", at(30)),
            Status::Degraded
        );
    }

    #[test]
    fn test_future_open_event_is_not_down_yet() {
        let (engine, inventory, _) = setup();
        let events = vec![event(CheckType::Site, None, 20, None)];
        let current = current_status(&engine, &events, &inventory, at(10));
        assert_eq!(current.status, Status::Operational);
    }
}
