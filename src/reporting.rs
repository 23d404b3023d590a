use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use colored::*;
use tokio::time;
use tracing::{error, info, warn};

use crate::billing::{billing_window, evaluate_member, events_for_member, member_inventory, monthly_history};
use crate::cli::Cli;
use crate::config::Settings;
use crate::models::{MemberBreakdown, MemberRecord, MemberReport, ServiceCost};
use crate::sla::{UptimeClass, uptime_class};
use crate::status::Status;
use crate::storage::{load_billing, load_events, load_members, save_export};
use crate::uptime::UptimeEngine;

const HISTORY_MONTHS: u32 = 12;

pub(crate) async fn run_billing_once(settings: &Settings, cli: &Cli, now: DateTime<Utc>) -> Result<Vec<MemberReport>> {
    let year = cli.year.unwrap_or_else(|| now.year());
    let month = cli.month.unwrap_or_else(|| now.month());
    let Some(window) = billing_window(year, month, now, cli.month_to_date) else {
        anyhow::bail!("invalid billing period {}-{:02}", year, month);
    };

    // History needs the trailing year of events, not just the billing month.
    let since = if cli.history {
        None
    } else {
        Some(window.start)
    };
    let (events, roster, billing) = futures::try_join!(
        load_events(
            settings.data.events_path.clone(),
            settings.data.events_format.clone(),
            since,
            Some(window.end.max(now)),
        ),
        load_members(settings.data.members_path.clone()),
        load_billing(settings.data.billing_path.clone()),
    )?;

    let members = collect_members(billing.members, &roster, cli.member.as_deref());
    if members.is_empty() {
        warn!(member = ?cli.member, "No members to evaluate");
        return Ok(Vec::new());
    }

    let roster_by_name: HashMap<&str, &MemberRecord> =
        roster.iter().map(|m| (m.name.as_str(), m)).collect();
    let engine = UptimeEngine::new(&settings.policy);

    let reports: Vec<MemberReport> = members
        .iter()
        .map(|member| {
            let roster_entry = roster_by_name.get(member.name.as_str()).copied();
            let member_events = events_for_member(&events, &member.name);
            let mut report = evaluate_member(&engine, member, roster_entry, &member_events, window, now);
            if cli.history {
                let inventory = member_inventory(member, roster_entry);
                report.history = monthly_history(&engine, &member_events, &inventory, now, HISTORY_MONTHS);
            }
            report
        })
        .collect();

    info!(
        members = reports.len(),
        events = events.len(),
        period = %format!("{}-{:02}", year, month),
        "Recalculated billing"
    );

    if settings.output.output_to_console {
        format_report_console(&reports);
    }

    if let Some(path) = &settings.output.export_path {
        if cli.dry_run {
            info!(path = %path, "Dry run, export not written");
        } else {
            save_export(path.clone(), reports.clone()).await?;
            info!(path = %path, "Billing export written");
        }
    }

    Ok(reports)
}

/// Members from the billing breakdown, plus roster members the breakdown does
/// not bill (their services carry no cost).
fn collect_members(
    mut billed: Vec<MemberBreakdown>,
    roster: &[MemberRecord],
    only: Option<&str>,
) -> Vec<MemberBreakdown> {
    for record in roster {
        if billed.iter().all(|m| m.name != record.name) {
            billed.push(MemberBreakdown {
                name: record.name.clone(),
                services: record
                    .services
                    .iter()
                    .map(|name| ServiceCost {
                        name: name.clone(),
                        base_cost: None,
                        active: None,
                    })
                    .collect(),
            });
        }
    }
    billed.retain(|m| only.is_none_or(|name| m.name.eq_ignore_ascii_case(name)));
    billed.sort_by(|a, b| a.name.cmp(&b.name));
    billed
}

pub(crate) async fn run_watch(settings: &Settings, cli: &Cli) -> Result<()> {
    if cli.now.is_some() {
        anyhow::bail!("--now cannot be combined with --watch");
    }
    info!(interval = %humantime::format_duration(settings.watch.interval), "Watching billing");
    watch_until(settings, cli, tokio::signal::ctrl_c()).await;
    info!("Interrupted, stopping watch");
    Ok(())
}

/// Recalculates billing on every tick until `shutdown` resolves. The shutdown
/// future is polled across ticks, so a signal that lands during a
/// recalculation is still observed.
async fn watch_until<F: Future>(settings: &Settings, cli: &Cli, shutdown: F) {
    let mut ticker = time::interval(settings.watch.interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            _ = ticker.tick() => {
                if let Err(e) = run_billing_once(settings, cli, Utc::now()).await {
                    error!("Failed to recalculate billing: {:#}", e);
                }
            }
        }
    }
}

fn colored_uptime(uptime: f64) -> ColoredString {
    let text = format!("{:.3}%", uptime);
    match uptime_class(uptime) {
        UptimeClass::Excellent => text.green().bold(),
        UptimeClass::Good => text.green(),
        UptimeClass::Fair => text.yellow(),
        UptimeClass::Poor => text.red(),
    }
}

fn colored_status(status: Status) -> ColoredString {
    let text = status.to_string();
    match status {
        Status::Operational => text.green(),
        Status::Degraded => text.yellow(),
        Status::Offline => text.red().bold(),
    }
}

fn format_report_console(reports: &[MemberReport]) {
    for report in reports {
        let billing = &report.billing;
        println!("💵 {}", billing.member.bold());
        println!("-----------------");
        println!(
            "Period: {} - {} (as of {})",
            report.window.start.format("%Y-%m-%d %H:%M"),
            report.window.end.format("%Y-%m-%d %H:%M"),
            report.now.format("%Y-%m-%d %H:%M:%S %Z")
        );
        println!(
            "Status: {} (health {:.0}%), site uptime {}, avg service uptime {}",
            colored_status(report.status),
            report.health,
            colored_uptime(report.site_uptime),
            colored_uptime(report.average_service_uptime)
        );
        println!(
            "Base: ${:.2}  Credits: ${:.2}  Billed: ${:.2}  SLA: {}",
            billing.total_base_cost,
            billing.total_credits,
            billing.total_billed,
            if billing.meets_sla { "PASS".green() } else { "FAIL".red() }
        );

        for service in &billing.services {
            let status = report
                .service_status
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&service.name))
                .map(|(_, s)| *s)
                .unwrap_or(Status::Operational);
            println!(
                "  {:<28} {} {:>9}  base ${:.2}  credit ${:.2}  billed ${:.2}  {}",
                service.name,
                colored_uptime(service.uptime_percentage),
                colored_status(status),
                service.base_cost,
                service.credits,
                service.billed_cost,
                if service.meets_sla { "PASS".green() } else { "FAIL".red() }
            );
        }

        if !report.history.is_empty() {
            println!("  Monthly uptime:");
            for month in &report.history {
                let down = Duration::from_secs((month.avg_downtime_hours * 3600.0).round() as u64);
                let down_text = if down.is_zero() {
                    "no downtime".to_string()
                } else {
                    format!("{} avg down", humantime::format_duration(down))
                };
                println!(
                    "    {}-{:02}  {}  {}",
                    month.year,
                    month.month,
                    colored_uptime(month.uptime),
                    down_text
                );
            }
        }
        println!();
    }
}
