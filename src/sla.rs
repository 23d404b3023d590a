use serde::Serialize;

use crate::models::{MemberBillingRecord, ServiceResult};

pub(crate) const SLA_TARGET_PERCENT: f64 = 99.9;

/// Credit fraction per tier, highest uptime floor first. Anything below the
/// last floor gets `FLOOR_CREDIT`.
const CREDIT_TIERS: [(f64, f64); 3] = [(SLA_TARGET_PERCENT, 0.0), (99.0, 0.10), (95.0, 0.25)];
const FLOOR_CREDIT: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SlaOutcome {
    pub(crate) meets_sla: bool,
    pub(crate) credits: f64,
    pub(crate) billed_cost: f64,
}

pub(crate) fn apply_credit(base_cost: f64, uptime: f64) -> SlaOutcome {
    let base_cost = if base_cost.is_finite() { base_cost.max(0.0) } else { 0.0 };
    let fraction = CREDIT_TIERS
        .iter()
        .find(|(floor, _)| uptime >= *floor)
        .map(|(_, fraction)| *fraction)
        .unwrap_or(FLOOR_CREDIT);
    let credits = base_cost * fraction;
    SlaOutcome {
        meets_sla: uptime >= SLA_TARGET_PERCENT,
        credits,
        billed_cost: base_cost - credits,
    }
}

pub(crate) fn service_result(name: &str, base_cost: Option<f64>, uptime: f64) -> ServiceResult {
    let outcome = apply_credit(base_cost.unwrap_or(0.0), uptime);
    ServiceResult {
        name: name.to_string(),
        base_cost: base_cost.filter(|c| c.is_finite()).unwrap_or(0.0).max(0.0),
        uptime_percentage: uptime,
        meets_sla: outcome.meets_sla,
        credits: outcome.credits,
        billed_cost: outcome.billed_cost,
    }
}

pub(crate) fn aggregate_member(member: &str, services: Vec<ServiceResult>) -> MemberBillingRecord {
    let total_base_cost: f64 = services.iter().map(|s| s.base_cost).sum();
    let total_credits: f64 = services.iter().map(|s| s.credits).sum();
    MemberBillingRecord {
        member: member.to_string(),
        total_base_cost,
        total_credits,
        total_billed: total_base_cost - total_credits,
        meets_sla: services.iter().all(|s| s.meets_sla),
        services,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UptimeClass {
    Excellent,
    Good,
    Fair,
    Poor,
}

pub(crate) fn uptime_class(uptime: f64) -> UptimeClass {
    if uptime >= 99.99 {
        UptimeClass::Excellent
    } else if uptime >= SLA_TARGET_PERCENT {
        UptimeClass::Good
    } else if uptime >= 99.0 {
        UptimeClass::Fair
    } else {
        UptimeClass::Poor
    }
}
