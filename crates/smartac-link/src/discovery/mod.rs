/*!
 * Network discovery of AC-like devices.
 *
 * Three scan methods (mDNS, SSDP, targeted port probe) run concurrently
 * under one time budget. A failing or timed-out method never sinks the
 * others; results are merged, deduplicated by address and cached for a
 * short TTL.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use smartac_core::config::LinkConfig;
use smartac_core::types::Metadata;
use smartac_core::utils::millis_to_duration;

use crate::error::Result;

pub mod mdns;
pub mod probe;
pub mod ssdp;

pub use mdns::MdnsScan;
pub use probe::PortProbeScan;
pub use ssdp::SsdpScan;

/// How long merged discovery results stay cached
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default overall discovery budget
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(8);

/// The scan method that produced a candidate.
///
/// Doubles as the confidence ranking for deduplication: mDNS beats SSDP
/// beats port probing, reflecting how reliably each attributes a brand
/// and a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscoveryMethod {
    /// Multicast DNS service advertisement
    #[serde(rename = "mdns")]
    Mdns,
    /// SSDP/UPnP discovery protocol
    #[serde(rename = "ssdp")]
    Ssdp,
    /// Targeted HTTP port probe
    #[serde(rename = "port_scan")]
    PortScan,
}

impl DiscoveryMethod {
    /// The wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Mdns => "mdns",
            DiscoveryMethod::Ssdp => "ssdp",
            DiscoveryMethod::PortScan => "port_scan",
        }
    }

    fn confidence(&self) -> u8 {
        match self {
            DiscoveryMethod::Mdns => 2,
            DiscoveryMethod::Ssdp => 1,
            DiscoveryMethod::PortScan => 0,
        }
    }
}

/// An AC-like device seen on the local network
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Network address
    pub host: String,
    /// Port the device was seen on
    pub port: u16,
    /// Display name, cleaned of service-type suffixes
    pub name: String,
    /// Best-effort brand guess
    pub brand: Option<String>,
    /// The method that produced this candidate
    pub method: DiscoveryMethod,
    /// Method-specific raw metadata
    pub metadata: Metadata,
}

/// One concurrent scan method
#[async_trait]
pub trait ScanMethod: Send + Sync + Debug {
    /// Human-readable method name for logs
    fn name(&self) -> &'static str;

    /// The method tag stamped onto produced candidates
    fn method(&self) -> DiscoveryMethod;

    /// Run the scan within the budget, releasing all network resources
    /// on every exit path
    async fn scan(&self, budget: Duration) -> Result<Vec<Candidate>>;
}

struct CacheEntry {
    candidates: Vec<Candidate>,
    refreshed: Instant,
}

/// The discovery engine.
///
/// Holds the scan methods and the process-wide result cache. The cache
/// is replaced atomically on refresh and readable concurrently.
#[derive(Debug)]
pub struct DiscoveryEngine {
    methods: Vec<Arc<dyn ScanMethod>>,
    cache: RwLock<Option<CacheEntry>>,
    ttl: Duration,
    budget: Duration,
}

impl Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("candidates", &self.candidates.len())
            .field("refreshed", &self.refreshed)
            .finish()
    }
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryEngine {
    /// Create an engine with the three standard scan methods
    pub fn new() -> Self {
        Self::with_methods(vec![
            Arc::new(MdnsScan::new()),
            Arc::new(SsdpScan::new()),
            Arc::new(PortProbeScan::new()),
        ])
    }

    /// Create an engine from the link configuration section
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::with_methods(vec![
            Arc::new(MdnsScan::new()),
            Arc::new(SsdpScan::new()),
            Arc::new(PortProbeScan::with_probe_timeout(millis_to_duration(
                config.probe_timeout_ms,
            ))),
        ])
        .with_ttl(Duration::from_secs(config.discovery_cache_ttl_secs))
        .with_budget(millis_to_duration(config.discovery_budget_ms))
    }

    /// Create an engine with explicit scan methods
    pub fn with_methods(methods: Vec<Arc<dyn ScanMethod>>) -> Self {
        Self {
            methods,
            cache: RwLock::new(None),
            ttl: DEFAULT_CACHE_TTL,
            budget: DEFAULT_BUDGET,
        }
    }

    /// Override the cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the default scan budget used by [`Self::discover`]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Discover AC-like devices using the engine's configured budget
    pub async fn discover(&self) -> Vec<Candidate> {
        self.discover_all(self.budget).await
    }

    /// Discover AC-like devices on the local network.
    ///
    /// Returns the cached result set when it is non-empty and fresh.
    /// Otherwise all scan methods run concurrently under `budget`; a
    /// method that fails or times out contributes nothing but never
    /// fails the overall call.
    pub async fn discover_all(&self, budget: Duration) -> Vec<Candidate> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if !entry.candidates.is_empty() && entry.refreshed.elapsed() < self.ttl {
                    debug!(
                        "Returning {} cached discovery results",
                        entry.candidates.len()
                    );
                    return entry.candidates.clone();
                }
            }
        }

        info!(
            "Starting discovery scan ({} methods, budget {:?})",
            self.methods.len(),
            budget
        );

        let scans = self.methods.iter().map(|method| {
            let method = method.clone();
            async move {
                match tokio::time::timeout(budget, method.scan(budget)).await {
                    Ok(Ok(candidates)) => {
                        debug!("{} found {} candidates", method.name(), candidates.len());
                        candidates
                    }
                    Ok(Err(e)) => {
                        warn!("{} scan failed: {}", method.name(), e);
                        Vec::new()
                    }
                    Err(_) => {
                        warn!("{} scan exceeded the discovery budget", method.name());
                        Vec::new()
                    }
                }
            }
        });

        let merged = merge_candidates(join_all(scans).await.into_iter().flatten());
        info!("Discovery finished with {} unique devices", merged.len());

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            candidates: merged.clone(),
            refreshed: Instant::now(),
        });
        merged
    }

    /// Drop the cached result set so the next call rescans
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

/// Deduplicate candidates by host, keeping the highest-confidence method
fn merge_candidates<I: IntoIterator<Item = Candidate>>(candidates: I) -> Vec<Candidate> {
    let mut by_host: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        match by_host.get(&candidate.host) {
            Some(existing) if existing.method.confidence() >= candidate.method.confidence() => {}
            _ => {
                by_host.insert(candidate.host.clone(), candidate);
            }
        }
    }
    let mut merged: Vec<Candidate> = by_host.into_values().collect();
    merged.sort_by(|a, b| a.host.cmp(&b.host));
    merged
}

/// Strip mDNS/UPnP service-type suffixes and tidy up a display name
pub(crate) fn clean_device_name(raw: &str) -> String {
    // Instance names look like "Living Room AC._aircon._tcp.local"
    let mut name = match raw.find("._") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    name = name.strip_suffix(".local").unwrap_or(name);
    name.replace(['_', '-'], " ").trim().to_string()
}

/// Best-effort brand guess from any advertised text
pub(crate) fn guess_brand(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    for brand in [
        "daikin",
        "samsung",
        "midea",
        "gree",
        "carrier",
        "comfee",
        "toshiba",
        "hisense",
        "tosot",
        "haier",
        "voltas",
        "bluestar",
        "hitachi",
        "panasonic",
        "mitsubishi",
        "whirlpool",
        "godrej",
        "lloyd",
        "lg",
    ] {
        if lower.contains(brand) {
            return Some(brand);
        }
    }
    None
}

/// Turn a raw SSDP SERVER header into a display name.
///
/// SERVER values read like "Linux/4.1 UPnP/1.0 Samsung RAC_Device/1.0";
/// the OS and protocol stamps are stripped so the vendor product token
/// remains. When nothing usable is left the name falls back to
/// "\<Brand\> AC (\<host\>)".
pub(crate) fn clean_ssdp_name(raw: &str, brand: Option<&str>, host: &str) -> String {
    let kept: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.to_lowercase().starts_with("portable sdk"))
        .flat_map(str::split_whitespace)
        .filter(|token| !is_upnp_junk(token))
        .collect();
    let cleaned = kept.join(" ");
    if cleaned.len() < 2 {
        let label = brand.map(capitalize).unwrap_or_else(|| "Smart".to_string());
        return format!("{} AC ({})", label, host);
    }
    cleaned
}

fn is_upnp_junk(token: &str) -> bool {
    let lower = token.to_lowercase();
    lower == "unspecified"
        || lower.starts_with("upnp/")
        || lower.starts_with("linux/")
        || lower.starts_with("windows/")
}

/// Capitalize a brand key for display ("daikin" -> "Daikin")
pub(crate) fn capitalize(brand: &str) -> String {
    let mut chars = brand.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(host: &str, method: DiscoveryMethod) -> Candidate {
        Candidate {
            host: host.to_string(),
            port: 80,
            name: format!("AC at {}", host),
            brand: None,
            method,
            metadata: Metadata::new(),
        }
    }

    #[derive(Debug)]
    struct FixedScan {
        method: DiscoveryMethod,
        hosts: Vec<&'static str>,
        calls: std::sync::atomic::AtomicUsize,
        seen_budget: std::sync::Mutex<Option<Duration>>,
        fail: bool,
    }

    impl FixedScan {
        fn new(method: DiscoveryMethod, hosts: Vec<&'static str>) -> Self {
            Self {
                method,
                hosts,
                calls: std::sync::atomic::AtomicUsize::new(0),
                seen_budget: std::sync::Mutex::new(None),
                fail: false,
            }
        }

        fn failing(method: DiscoveryMethod) -> Self {
            Self {
                method,
                hosts: Vec::new(),
                calls: std::sync::atomic::AtomicUsize::new(0),
                seen_budget: std::sync::Mutex::new(None),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl ScanMethod for FixedScan {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn method(&self) -> DiscoveryMethod {
            self.method
        }

        async fn scan(&self, budget: Duration) -> Result<Vec<Candidate>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            *self.seen_budget.lock().unwrap() = Some(budget);
            if self.fail {
                return Err(crate::error::LinkError::TransportFailure(
                    "socket bind refused".to_string(),
                ));
            }
            Ok(self
                .hosts
                .iter()
                .map(|h| candidate(h, self.method))
                .collect())
        }
    }

    #[test]
    fn test_dedup_prefers_higher_confidence_method() {
        let merged = merge_candidates(vec![
            candidate("192.168.1.50", DiscoveryMethod::PortScan),
            candidate("192.168.1.50", DiscoveryMethod::Mdns),
            candidate("192.168.1.51", DiscoveryMethod::Ssdp),
            candidate("192.168.1.51", DiscoveryMethod::PortScan),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].host, "192.168.1.50");
        assert_eq!(merged[0].method, DiscoveryMethod::Mdns);
        assert_eq!(merged[1].method, DiscoveryMethod::Ssdp);
    }

    #[test]
    fn test_dedup_first_wins_on_equal_confidence() {
        let mut first = candidate("192.168.1.50", DiscoveryMethod::Ssdp);
        first.name = "first".to_string();
        let mut second = candidate("192.168.1.50", DiscoveryMethod::Ssdp);
        second.name = "second".to_string();

        let merged = merge_candidates(vec![first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "first");
    }

    #[test]
    fn test_clean_device_name() {
        assert_eq!(
            clean_device_name("Living_Room_AC._airconditioner._tcp.local"),
            "Living Room AC"
        );
        assert_eq!(clean_device_name("bedroom-ac.local"), "bedroom ac");
        assert_eq!(clean_device_name("Plain Name"), "Plain Name");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("daikin"), "Daikin");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_clean_ssdp_name_strips_protocol_stamps() {
        assert_eq!(
            clean_ssdp_name(
                "Linux/4.1 UPnP/1.0 Samsung RAC_Device/1.0",
                Some("samsung"),
                "192.168.1.73"
            ),
            "Samsung RAC_Device/1.0"
        );
        assert_eq!(
            clean_ssdp_name(
                "Unspecified, UPnP/1.0, Unspecified",
                Some("samsung"),
                "192.168.1.73"
            ),
            "Samsung AC (192.168.1.73)"
        );
        assert_eq!(
            clean_ssdp_name(
                "Linux/3.14, UPnP/1.0, Portable SDK for UPnP devices/1.6.18",
                None,
                "192.168.1.40"
            ),
            "Smart AC (192.168.1.40)"
        );
        assert_eq!(clean_ssdp_name("", None, "192.168.1.40"), "Smart AC (192.168.1.40)");
    }

    #[test]
    fn test_guess_brand_covers_common_vendors() {
        assert_eq!(guess_brand("Gree Smart Home/1.0"), Some("gree"));
        assert_eq!(guess_brand("LLOYD-AC-1234"), Some("lloyd"));
        assert_eq!(guess_brand("Haier uHome"), Some("haier"));
        assert_eq!(guess_brand("MiniUPnPd/2.2"), None);
    }

    #[tokio::test]
    async fn test_partial_failure_yields_partial_results() {
        let engine = DiscoveryEngine::with_methods(vec![
            Arc::new(FixedScan::new(DiscoveryMethod::Mdns, vec!["192.168.1.50"])),
            Arc::new(FixedScan::failing(DiscoveryMethod::Ssdp)),
        ]);

        let found = engine.discover_all(Duration::from_millis(100)).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].host, "192.168.1.50");
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let scan = Arc::new(FixedScan::new(DiscoveryMethod::Mdns, vec!["192.168.1.50"]));
        let engine = DiscoveryEngine::with_methods(vec![scan.clone()]);

        let first = engine.discover_all(Duration::from_millis(100)).await;
        let second = engine.discover_all(Duration::from_millis(100)).await;
        assert_eq!(first.len(), second.len());
        assert_eq!(scan.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_rescan() {
        let scan = Arc::new(FixedScan::new(DiscoveryMethod::Mdns, vec!["192.168.1.50"]));
        let engine = DiscoveryEngine::with_methods(vec![scan.clone()]);

        engine.discover_all(Duration::from_millis(100)).await;
        engine.clear_cache().await;
        engine.discover_all(Duration::from_millis(100)).await;
        assert_eq!(scan.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_discover_uses_configured_budget() {
        let scan = Arc::new(FixedScan::new(DiscoveryMethod::Mdns, vec!["192.168.1.50"]));
        let engine = DiscoveryEngine::with_methods(vec![scan.clone()])
            .with_budget(Duration::from_millis(250));

        engine.discover().await;
        assert_eq!(
            *scan.seen_budget.lock().unwrap(),
            Some(Duration::from_millis(250))
        );
    }

    #[tokio::test]
    async fn test_empty_cache_entry_is_not_served() {
        let scan = Arc::new(FixedScan::new(DiscoveryMethod::Mdns, Vec::new()));
        let engine = DiscoveryEngine::with_methods(vec![scan.clone()]);

        engine.discover_all(Duration::from_millis(100)).await;
        engine.discover_all(Duration::from_millis(100)).await;
        // An empty result set is never cached, so both calls scan
        assert_eq!(scan.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
