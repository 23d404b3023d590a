use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{PolicySettings, UnresolvedPolicy};
use crate::domain::DomainRules;
use crate::interval::{Interval, merge_intervals, total_duration_millis};
use crate::models::{CheckType, DowntimeEvent, EvaluationWindow, ServiceInventory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Attribution {
    /// Counts against every service of the member.
    Site,
    /// Counts against one inventory service (canonical inventory spelling).
    Service(String),
}

#[derive(Debug, Clone)]
pub(crate) struct AttributedDowntime {
    pub(crate) interval: Interval,
    pub(crate) attribution: Attribution,
}

impl AttributedDowntime {
    pub(crate) fn affects(&self, service: &str) -> bool {
        match &self.attribution {
            Attribution::Site => true,
            Attribution::Service(name) => name.eq_ignore_ascii_case(service),
        }
    }
}

/// Uptime calculator. Holds only policy; every call is a pure function of
/// its arguments, with `now` passed in explicitly.
#[derive(Debug, Clone)]
pub(crate) struct UptimeEngine {
    rules: DomainRules,
    exclude_system_domains: bool,
    weight_by_service_count: bool,
    unresolved: UnresolvedPolicy,
}

impl UptimeEngine {
    pub(crate) fn new(policy: &PolicySettings) -> Self {
        Self {
            rules: DomainRules::from_policy(policy),
            exclude_system_domains: policy.exclude_system_domains,
            weight_by_service_count: policy.weight_by_service_count,
            unresolved: policy.unresolved_events,
        }
    }

    /// Decides which services an event counts against, or `None` when the
    /// event must not contribute at all.
    fn classify(&self, event: &DowntimeEvent, inventory: &ServiceInventory) -> Option<Attribution> {
        let target = event.target();
        if self.exclude_system_domains && target.is_some_and(|t| self.rules.is_system_domain(t)) {
            return None;
        }
        if event.check_type == CheckType::Site {
            return Some(Attribution::Site);
        }
        match self.rules.resolve_service_name(target, inventory.names()) {
            Some(name) => Some(Attribution::Service(name)),
            None => match self.unresolved {
                UnresolvedPolicy::Drop => None,
                UnresolvedPolicy::SiteWide => Some(Attribution::Site),
            },
        }
    }

    /// Resolves every usable event to a raw downtime interval. Open events
    /// end at `min(now, window.end)`. Intervals are not clamped yet.
    pub(crate) fn attribute(
        &self,
        events: &[DowntimeEvent],
        inventory: &ServiceInventory,
        window: &EvaluationWindow,
        now: DateTime<Utc>,
    ) -> Vec<AttributedDowntime> {
        let open_end = now.min(window.end);
        let mut skipped = 0usize;
        let attributed: Vec<AttributedDowntime> = events
            .iter()
            .filter_map(|event| {
                let Some(start) = event.start_time else {
                    skipped += 1;
                    return None;
                };
                let attribution = self.classify(event, inventory)?;
                Some(AttributedDowntime {
                    interval: Interval::new(start, event.end_time.unwrap_or(open_end)),
                    attribution,
                })
            })
            .collect();
        if skipped > 0 {
            debug!(skipped, "Ignored downtime events without a usable start_time");
        }
        attributed
    }

    /// Events that are still open and already started at `now`.
    pub(crate) fn active_at(
        &self,
        events: &[DowntimeEvent],
        inventory: &ServiceInventory,
        now: DateTime<Utc>,
    ) -> Vec<Attribution> {
        events
            .iter()
            .filter(|event| event.is_open() && event.start_time.is_some_and(|s| s <= now))
            .filter_map(|event| self.classify(event, inventory))
            .collect()
    }

    pub(crate) fn service_uptime(
        &self,
        events: &[DowntimeEvent],
        window: &EvaluationWindow,
        service: &str,
        inventory: &ServiceInventory,
        now: DateTime<Utc>,
    ) -> f64 {
        if window.is_degenerate() {
            return 100.0;
        }
        let relevant: Vec<Interval> = self
            .attribute(events, inventory, window, now)
            .into_iter()
            .filter(|d| d.affects(service))
            .map(|d| d.interval)
            .collect();
        if relevant.is_empty() {
            return 100.0;
        }
        let downtime = total_duration_millis(&merge_intervals(&relevant, window));
        uptime_percentage(window.duration_millis() as f64, downtime as f64)
    }

    /// Aggregate uptime of the member. With service-count weighting the
    /// capacity is measured in service-hours: each service gets its own
    /// timeline, site events are copied onto every timeline, and each
    /// timeline is merged once.
    pub(crate) fn site_uptime(
        &self,
        events: &[DowntimeEvent],
        window: &EvaluationWindow,
        inventory: &ServiceInventory,
        now: DateTime<Utc>,
    ) -> f64 {
        if inventory.is_empty() || window.is_degenerate() {
            return 100.0;
        }
        let attributed = self.attribute(events, inventory, window, now);
        let window_millis = window.duration_millis() as f64;

        if !self.weight_by_service_count {
            let all: Vec<Interval> = attributed.iter().map(|d| d.interval).collect();
            let downtime = total_duration_millis(&merge_intervals(&all, window));
            return uptime_percentage(window_millis, downtime as f64);
        }

        let downtime = downtime_service_millis(&attributed, window, inventory);
        let capacity = window_millis * inventory.len() as f64;
        uptime_percentage(capacity, downtime as f64)
    }
}

/// Sum over services of the merged downtime on each service's timeline.
pub(crate) fn downtime_service_millis(
    attributed: &[AttributedDowntime],
    window: &EvaluationWindow,
    inventory: &ServiceInventory,
) -> i64 {
    let mut timelines: Vec<Vec<Interval>> = vec![Vec::new(); inventory.len()];
    for downtime in attributed {
        match &downtime.attribution {
            Attribution::Site => timelines
                .iter_mut()
                .for_each(|timeline| timeline.push(downtime.interval)),
            Attribution::Service(name) => {
                if let Some(idx) = inventory.position(name) {
                    timelines[idx].push(downtime.interval);
                }
            }
        }
    }
    timelines
        .iter()
        .map(|timeline| total_duration_millis(&merge_intervals(timeline, window)))
        .sum()
}

pub(crate) fn uptime_percentage(capacity: f64, downtime: f64) -> f64 {
    if capacity <= 0.0 {
        return 100.0;
    }
    ((capacity - downtime) / capacity * 100.0).clamp(0.0, 100.0)
}
