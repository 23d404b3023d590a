use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use statistical::mean;

use crate::models::{
    DowntimeEvent, EvaluationWindow, MemberBreakdown, MemberRecord, MemberReport, MonthlyUptime,
    ServiceInventory,
};
use crate::sla::{aggregate_member, service_result};
use crate::status::{current_status, service_status};
use crate::uptime::UptimeEngine;

/// UTC calendar month `[first day, first day of next month)`.
pub(crate) fn month_window(year: i32, month: u32) -> Option<EvaluationWindow> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(EvaluationWindow::new(
        first.and_hms_opt(0, 0, 0)?.and_utc(),
        next.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}

/// Billing window for a period. Month-to-date ends the window at `now` while
/// the month is still running.
pub(crate) fn billing_window(
    year: i32,
    month: u32,
    now: DateTime<Utc>,
    month_to_date: bool,
) -> Option<EvaluationWindow> {
    let window = month_window(year, month)?;
    if month_to_date {
        Some(EvaluationWindow::new(window.start, window.end.min(now)))
    } else {
        Some(window)
    }
}

/// Services that count for a member: the roster's inventory plus every
/// billed service, minus services the breakdown marks inactive.
pub(crate) fn member_inventory(breakdown: &MemberBreakdown, roster: Option<&MemberRecord>) -> ServiceInventory {
    let mut inventory = ServiceInventory::new(roster.map(|r| r.services.as_slice()).unwrap_or_default());
    for service in &breakdown.services {
        if service.active == Some(false) {
            inventory.remove(&service.name);
        } else {
            inventory.insert(&service.name);
        }
    }
    inventory
}

pub(crate) fn events_for_member(events: &[DowntimeEvent], member: &str) -> Vec<DowntimeEvent> {
    events
        .iter()
        .filter(|e| e.member_name == member)
        .cloned()
        .collect()
}

pub(crate) fn evaluate_member(
    engine: &UptimeEngine,
    breakdown: &MemberBreakdown,
    roster: Option<&MemberRecord>,
    events: &[DowntimeEvent],
    window: EvaluationWindow,
    now: DateTime<Utc>,
) -> MemberReport {
    let inventory = member_inventory(breakdown, roster);

    let services: Vec<_> = breakdown
        .services
        .iter()
        .filter(|s| s.active != Some(false))
        .map(|s| {
            let uptime = engine.service_uptime(events, &window, &s.name, &inventory, now);
            service_result(&s.name, s.base_cost, uptime)
        })
        .collect();

    let uptimes: Vec<f64> = services.iter().map(|s| s.uptime_percentage).collect();
    let average_service_uptime = if uptimes.is_empty() { 100.0 } else { mean(&uptimes) };

    let current = current_status(engine, events, &inventory, now);
    let site_uptime = engine.site_uptime(events, &window, &inventory, now);

    MemberReport {
        window,
        now,
        site_uptime,
        average_service_uptime,
        health: current.health,
        status: current.status,
        service_status: inventory
            .names()
            .map(|name| {
                let status = service_status(engine, &current, events, &window, &inventory, name, now);
                (name.to_string(), status)
            })
            .collect(),
        billing: aggregate_member(&breakdown.name, services),
        history: Vec::new(),
    }
}

/// Site uptime for the `months` calendar months ending with the one that
/// contains `now`, oldest first.
pub(crate) fn monthly_history(
    engine: &UptimeEngine,
    events: &[DowntimeEvent],
    inventory: &ServiceInventory,
    now: DateTime<Utc>,
    months: u32,
) -> Vec<MonthlyUptime> {
    let Some(current_month) = NaiveDate::from_ymd_opt(now.year(), now.month(), 1) else {
        return Vec::new();
    };
    (0..months)
        .rev()
        .filter_map(|back| current_month.checked_sub_months(Months::new(back)))
        .filter_map(|first| {
            let window = month_window(first.year(), first.month())?;
            let uptime = engine.site_uptime(events, &window, inventory, now);
            let avg_downtime_hours = if inventory.is_empty() {
                0.0
            } else {
                window.duration_hours() * (1.0 - uptime / 100.0)
            };
            Some(MonthlyUptime {
                year: first.year(),
                month: first.month(),
                uptime,
                avg_downtime_hours,
            })
        })
        .collect()
}
