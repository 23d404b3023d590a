use std::fs::{File as StdFile, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scopeguard::guard;
use serde::de::DeserializeOwned;
use tokio::task;
use tracing::{debug, warn};

use crate::models::{BillingBreakdown, DowntimeEvent, MemberRecord, MemberReport};

fn overlaps(event: &DowntimeEvent, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> bool {
    // Events without a start stay in; the engine decides what to do with them.
    let Some(start) = event.start_time else {
        return true;
    };
    let starts_before_until = until.map_or(true, |u| start < u);
    let ends_after_since = match (since, event.end_time) {
        (Some(s), Some(end)) => end > s,
        _ => true,
    };
    starts_before_until && ends_after_since
}

/// Loads downtime events overlapping `[since, until)`. A missing file yields
/// no events. Malformed entries are skipped in both `json` and `jsonl` mode.
pub(crate) async fn load_events(
    path: String,
    format: String,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<Vec<DowntimeEvent>> {
    let events = task::spawn_blocking(move || -> Result<Vec<DowntimeEvent>> {
        let file = match StdFile::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path, "Downtime event file not found, assuming no downtime");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        match format.as_str() {
            "json" => {
                let all: Vec<serde_json::Value> = serde_json::from_reader(reader)
                    .with_context(|| format!("parsing downtime events from {}", path))?;
                for (index, value) in all.into_iter().enumerate() {
                    match serde_json::from_value::<DowntimeEvent>(value) {
                        Ok(event) => {
                            if overlaps(&event, since, until) {
                                events.push(event);
                            }
                        }
                        Err(e) => warn!(index, error = %e, "Skip malformed downtime event"),
                    }
                }
            }
            "jsonl" => {
                for (lineno, line) in reader.lines().enumerate() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<DowntimeEvent>(&line) {
                        Ok(event) => {
                            if overlaps(&event, since, until) {
                                events.push(event);
                            }
                        }
                        Err(e) => {
                            if e.is_eof() {
                                break;
                            }
                            warn!(line = lineno + 1, error = %e, "Skip malformed downtime event");
                        }
                    }
                }
            }
            other => anyhow::bail!("unsupported events_format: {}", other),
        }
        Ok(events)
    })
    .await??;

    debug!(count = events.len(), "Loaded downtime events");
    Ok(events)
}

async fn load_json_or_default<T>(path: String, what: &'static str) -> Result<T>
where
    T: DeserializeOwned + Default + Send + 'static,
{
    task::spawn_blocking(move || -> Result<T> {
        let file = match StdFile::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path, "No {} file found", what);
                return Ok(T::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {} from {}", what, path))
    })
    .await?
}

pub(crate) async fn load_members(path: String) -> Result<Vec<MemberRecord>> {
    load_json_or_default(path, "member roster").await
}

pub(crate) async fn load_billing(path: String) -> Result<BillingBreakdown> {
    load_json_or_default(path, "billing breakdown").await
}

/// Writes the reports as pretty JSON, replacing `path` atomically.
pub(crate) async fn save_export(path: String, reports: Vec<MemberReport>) -> Result<()> {
    task::spawn_blocking(move || -> Result<()> {
        let target = Path::new(&path);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_file = format!("{}.tmp", path);
        let cleanup = guard(tmp_file.clone(), |path| {
            let _ = std::fs::remove_file(path);
        });
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_file)?;
            let mut writer = std::io::BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, &reports)?;
            writer.flush()?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_file, target)?;
        scopeguard::ScopeGuard::into_inner(cleanup);
        Ok(())
    })
    .await??;

    Ok(())
}
