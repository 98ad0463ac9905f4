/*!
 * Targeted port-probe scan.
 *
 * Walks the local /24 issuing lightweight HTTP probes against the small
 * set of port/path pairs that correspond to known AC local APIs. A
 * response only counts when its body carries AC-specific markers, so a
 * generic web server on port 80 is not mistaken for a unit. Probes run
 * in bounded batches and the walk aborts early when the budget runs low.
 */
use std::net::UdpSocket;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, trace};

use smartac_core::types::{Metadata, Value};

use crate::discovery::{capitalize, Candidate, DiscoveryMethod, ScanMethod};
use crate::error::{LinkError, Result};

/// Hosts probed concurrently per batch
const BATCH_SIZE: usize = 50;

/// Budget slack kept so the last batch can still complete
const EARLY_ABORT_MARGIN: Duration = Duration::from_millis(500);

/// Known AC local API endpoints
const PROBE_TARGETS: [ProbeTarget; 2] = [
    ProbeTarget {
        brand: "daikin",
        port: 80,
        path: "/common/basic_info",
    },
    ProbeTarget {
        brand: "samsung",
        port: 8888,
        path: "/devices/0",
    },
];

/// Body substrings that mark a response as a genuine AC API
const BODY_MARKERS: [&str; 4] = ["ret=OK", "deviceId", "aircon", "temperature"];

#[derive(Debug, Clone, Copy)]
struct ProbeTarget {
    brand: &'static str,
    port: u16,
    path: &'static str,
}

/// Port-probe scan method
pub struct PortProbeScan {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl std::fmt::Debug for PortProbeScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortProbeScan")
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl Default for PortProbeScan {
    fn default() -> Self {
        Self::new()
    }
}

impl PortProbeScan {
    /// Create a port-probe scan with the default per-probe timeout
    pub fn new() -> Self {
        Self::with_probe_timeout(Duration::from_secs(2))
    }

    /// Create a scan with an explicit per-probe timeout
    pub fn with_probe_timeout(probe_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            probe_timeout,
        }
    }

    async fn probe_host(&self, host: &str) -> Option<Candidate> {
        for target in PROBE_TARGETS {
            let url = format!("http://{}:{}{}", host, target.port, target.path);
            let res = match self
                .client
                .get(&url)
                .timeout(self.probe_timeout)
                .send()
                .await
            {
                Ok(res) => res,
                Err(_) => continue,
            };
            let body = match res.text().await {
                Ok(body) => body,
                Err(_) => continue,
            };
            if !body_is_ac(&body) {
                trace!("{} answered but is not an AC", url);
                continue;
            }

            debug!("port probe found {} AC at {}", target.brand, host);
            let mut metadata = Metadata::new();
            metadata.insert("path".to_string(), Value::from(target.path));
            let name = extract_name(&body)
                .unwrap_or_else(|| format!("{} AC ({})", capitalize(target.brand), host));
            return Some(Candidate {
                host: host.to_string(),
                port: target.port,
                name,
                brand: Some(target.brand.to_string()),
                method: DiscoveryMethod::PortScan,
                metadata,
            });
        }
        None
    }
}

#[async_trait]
impl ScanMethod for PortProbeScan {
    fn name(&self) -> &'static str {
        "port_probe"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::PortScan
    }

    async fn scan(&self, budget: Duration) -> Result<Vec<Candidate>> {
        let deadline = Instant::now() + budget;
        let base = local_subnet_base()?;
        debug!("port probe scanning {}0/24", base);

        let hosts: Vec<String> = (1u8..=254).map(|n| format!("{}{}", base, n)).collect();
        let mut found = Vec::new();

        for batch in hosts.chunks(BATCH_SIZE) {
            if Instant::now() + EARLY_ABORT_MARGIN >= deadline {
                debug!("port probe aborting early, budget exhausted");
                break;
            }
            let probes = batch.iter().map(|host| self.probe_host(host));
            found.extend(join_all(probes).await.into_iter().flatten());
        }

        Ok(found)
    }
}

/// The local /24 prefix, including the trailing dot ("192.168.1.").
///
/// Connecting a UDP socket to a public address picks the outbound
/// interface without sending any traffic.
fn local_subnet_base() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    let local = socket.local_addr()?;
    match local.ip() {
        std::net::IpAddr::V4(ip) => {
            let octets = ip.octets();
            Ok(format!("{}.{}.{}.", octets[0], octets[1], octets[2]))
        }
        std::net::IpAddr::V6(_) => Err(LinkError::TransportUnavailable(
            "no IPv4 interface for subnet probing".to_string(),
        )),
    }
}

fn body_is_ac(body: &str) -> bool {
    BODY_MARKERS.iter().any(|m| body.contains(m))
}

/// Pull a device name out of the probe response where the API carries
/// one: `name=...` in Daikin key-value bodies (percent-encoded), or a
/// top-level `"name"` field in Samsung JSON.
fn extract_name(body: &str) -> Option<String> {
    if let Some(kv_name) = body
        .split(',')
        .find_map(|pair| pair.strip_prefix("name="))
    {
        let decoded = kv_name.replace("%20", " ");
        if !decoded.is_empty() {
            return Some(decoded);
        }
    }
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("name")?
        .as_str()
        .map(|s| s.to_string())
}
