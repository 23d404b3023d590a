use std::time::Duration;

use anyhow::Result;
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UnresolvedPolicy {
    /// Events that map to no known service are ignored.
    Drop,
    /// Events that map to no known service count against every service.
    SiteWide,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct PolicySettings {
    pub(crate) exclude_system_domains: bool,
    pub(crate) weight_by_service_count: bool,
    pub(crate) unresolved_events: UnresolvedPolicy,
    pub(crate) system_domains: Vec<String>,
    pub(crate) network_suffixes: Vec<String>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            exclude_system_domains: true,
            weight_by_service_count: true,
            unresolved_events: UnresolvedPolicy::Drop,
            system_domains: vec![
                "rpc.dotters.network".to_string(),
                "sys.dotters.network".to_string(),
                "rpc.ibp.network".to_string(),
                "sys.ibp.network".to_string(),
            ],
            network_suffixes: vec![".ibp.network".to_string(), ".dotters.network".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct DataSettings {
    pub(crate) events_path: String,
    pub(crate) events_format: String,
    pub(crate) members_path: String,
    pub(crate) billing_path: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            events_path: "data/downtime.jsonl".to_string(),
            events_format: "jsonl".to_string(),
            members_path: "data/members.json".to_string(),
            billing_path: "data/billing.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct OutputSettings {
    pub(crate) output_to_console: bool,
    pub(crate) export_path: Option<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_to_console: true,
            export_path: Some("output/billing.json".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct WatchSettings {
    #[serde(with = "humantime_serde")]
    pub(crate) interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) data: DataSettings,
    pub(crate) policy: PolicySettings,
    pub(crate) output: OutputSettings,
    pub(crate) watch: WatchSettings,
}

pub(crate) fn load_settings() -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::with_name("config/default.toml").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    let settings: Settings = settings.try_deserialize()?;
    if settings.watch.interval.is_zero() {
        anyhow::bail!("watch.interval must be greater than zero");
    }
    Ok(settings)
}
