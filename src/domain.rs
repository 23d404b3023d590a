use url::Url;

use crate::config::PolicySettings;

const STRIPPED_SCHEMES: [&str; 4] = ["https://", "http://", "wss://", "ws://"];

/// Host-level rules for attributing events to services.
#[derive(Debug, Clone)]
pub(crate) struct DomainRules {
    system_domains: Vec<String>,
    network_suffixes: Vec<String>,
}

impl DomainRules {
    pub(crate) fn new(system_domains: &[String], network_suffixes: &[String]) -> Self {
        Self {
            system_domains: system_domains
                .iter()
                .map(|d| normalize_domain(d))
                .filter(|d| !d.is_empty())
                .collect(),
            network_suffixes: network_suffixes
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub(crate) fn from_policy(policy: &PolicySettings) -> Self {
        Self::new(&policy.system_domains, &policy.network_suffixes)
    }

    pub(crate) fn is_system_domain(&self, raw: &str) -> bool {
        let host = normalize_domain(raw);
        !host.is_empty() && self.system_domains.iter().any(|d| *d == host)
    }

    /// Display name for a host: network suffix removed, hyphen segments
    /// title-cased (`my-chain-rpc.example.network` → `My-Chain-Rpc.example.network`
    /// unless `.example.network` is a configured suffix).
    pub(crate) fn domain_to_service_name(&self, raw: &str) -> Option<String> {
        let host = normalize_domain(raw);
        if host.is_empty() {
            return None;
        }
        let stem = self
            .network_suffixes
            .iter()
            .find_map(|suffix| host.strip_suffix(suffix.as_str()))
            .unwrap_or(&host);
        if stem.is_empty() {
            return None;
        }
        Some(
            stem.split('-')
                .map(title_case)
                .collect::<Vec<_>>()
                .join("-"),
        )
    }

    /// Finds the inventory entry an endpoint belongs to, matching
    /// case-insensitively.
    pub(crate) fn resolve_service_name<'a, I>(&self, raw: Option<&str>, known: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let candidate = self.domain_to_service_name(raw?)?;
        known
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(&candidate))
            .map(str::to_string)
    }
}

fn title_case(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Strips the websocket/http scheme, any port and path, and lowercases the
/// host. Returns an empty string when nothing host-like remains.
pub(crate) fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    let rest = STRIPPED_SCHEMES
        .iter()
        .find_map(|scheme| lower.strip_prefix(scheme))
        .unwrap_or(&lower);
    if rest.is_empty() {
        return String::new();
    }

    // Hosts are kept as written; only bracketed IPv6 literals go through the URL parser.
    if rest.starts_with('[') {
        return Url::parse(&format!("http://{}", rest))
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or_default();
    }
    rest.split(['/', ':', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> DomainRules {
        DomainRules::new(
            &[
                "rpc.dotters.network".to_string(),
                "sys.dotters.network".to_string(),
                "rpc.ibp.network".to_string(),
                "sys.ibp.network".to_string(),
            ],
            &[".ibp.network".to_string(), ".dotters.network".to_string()],
        )
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("wss://Polkadot.IBP.network:443/ws"), "polkadot.ibp.network");
        assert_eq!(normalize_domain("https://kusama.dotters.network/rpc"), "kusama.dotters.network");
        assert_eq!(normalize_domain("westend.ibp.network"), "westend.ibp.network");
        assert_eq!(normalize_domain("ws://asset-hub.example:9944"), "asset-hub.example");
        assert_eq!(normalize_domain(""), "");
        assert_eq!(normalize_domain("   "), "");
        assert_eq!(normalize_domain("https://"), "");
    }

    #[test]
    fn test_normalize_domain_keeps_host_text() {
        assert_eq!(normalize_domain("http://123"), "123");
        assert_eq!(normalize_domain("wss://10.0.0.1:9944/ws"), "10.0.0.1");
        assert_eq!(normalize_domain("wss://München.Example/ws"), "münchen.example");
        assert_eq!(normalize_domain("https://polkadot.ibp.network?chain=1"), "polkadot.ibp.network");
        assert_eq!(normalize_domain("ws://[::1]:9944/"), "[::1]");
    }

    #[test]
    fn test_domain_to_service_name() {
        let rules = rules();
        assert_eq!(
            rules.domain_to_service_name("asset-hub-polkadot.ibp.network").as_deref(),
            Some("Asset-Hub-Polkadot")
        );
        assert_eq!(
            rules.domain_to_service_name("wss://KUSAMA.dotters.network:443").as_deref(),
            Some("Kusama")
        );
        assert_eq!(
            rules.domain_to_service_name("my-chain-rpc.example.network").as_deref(),
            Some("My-Chain-Rpc.example.network")
        );
        assert_eq!(rules.domain_to_service_name(""), None);
    }

    #[test]
    fn test_resolve_service_name_matches_case_insensitively() {
        let rules = rules();
        let known = ["Polkadot", "Asset-Hub-Kusama"];
        assert_eq!(
            rules.resolve_service_name(Some("wss://asset-hub-kusama.ibp.network/"), known),
            Some("Asset-Hub-Kusama".to_string())
        );
        assert_eq!(
            rules.resolve_service_name(Some("POLKADOT.dotters.network"), known),
            Some("Polkadot".to_string())
        );
        assert_eq!(rules.resolve_service_name(Some("westend.ibp.network"), known), None);
        assert_eq!(rules.resolve_service_name(None, known), None);
        assert_eq!(rules.resolve_service_name(Some("https://"), known), None);
    }

    #[test]
    fn test_system_domains() {
        let rules = rules();
        assert!(rules.is_system_domain("wss://rpc.ibp.network/polkadot"));
        assert!(rules.is_system_domain("SYS.dotters.network:443"));
        assert!(!rules.is_system_domain("polkadot.ibp.network"));
        assert!(!rules.is_system_domain(""));
    }
}
