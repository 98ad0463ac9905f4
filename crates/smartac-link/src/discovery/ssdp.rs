/*!
 * SSDP discovery-protocol scan.
 *
 * Issues staged M-SEARCH broadcasts (an AC-specific query, then a
 * Samsung query, then a catch-all) and collects unicast responses. The
 * catch-all query returns routers, TVs and everything else on the
 * segment, so responses pass a strict keyword allow-list before they
 * become candidates.
 */
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, trace};

use smartac_core::types::{Metadata, Value};
use smartac_core::utils::spawn_and_log;

use crate::discovery::{clean_ssdp_name, guess_brand, Candidate, DiscoveryMethod, ScanMethod};
use crate::error::Result;

const SSDP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;

/// Search targets, sent in order with a small delay between each
const SEARCH_TARGETS: [&str; 3] = [
    "urn:schemas-upnp-org:device:hvac:1",
    "urn:samsung.com:device:AirConditioner:1",
    "ssdp:all",
];

const STAGE_DELAY: Duration = Duration::from_millis(300);

/// Keywords that mark a response as plausibly an AC
const AC_KEYWORDS: [&str; 23] = [
    "airconditioner",
    "aircon",
    "air_conditioner",
    "air-conditioner",
    "hvac",
    "climate",
    "daikin",
    "samsung",
    "lg",
    "midea",
    "haier",
    "gree",
    "carrier",
    "voltas",
    "bluestar",
    "hitachi",
    "panasonic",
    "mitsubishi",
    "toshiba",
    "whirlpool",
    "godrej",
    "lloyd",
    "rac_", // Samsung room AC model prefix
];

/// LOCATION port/path markers for known AC local APIs
const AC_PORT_PATHS: [&str; 3] = [":8888", ":80/aircon", ":80/common/basic_info"];

/// SSDP scan method
#[derive(Debug, Default)]
pub struct SsdpScan;

impl SsdpScan {
    /// Create an SSDP scan method
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScanMethod for SsdpScan {
    fn name(&self) -> &'static str {
        "ssdp"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Ssdp
    }

    async fn scan(&self, budget: Duration) -> Result<Vec<Candidate>> {
        let deadline = Instant::now() + budget;
        let socket = Arc::new(UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?);

        // Stage the queries from a separate task so slow sends never eat
        // into receive time; aborted (and the socket released) on every
        // exit path below.
        let sender = {
            let socket = socket.clone();
            spawn_and_log("ssdp m-search", async move {
                for (i, target) in SEARCH_TARGETS.iter().enumerate() {
                    if i > 0 {
                        sleep(STAGE_DELAY).await;
                    }
                    let query = build_msearch(target);
                    socket
                        .send_to(query.as_bytes(), (SSDP_ADDR, SSDP_PORT))
                        .await?;
                }
                Ok::<_, std::io::Error>(())
            })
        };

        let mut found: Vec<Candidate> = Vec::new();
        let mut seen_hosts = HashSet::new();
        let mut buf = [0u8; 2048];

        loop {
            let (len, addr) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    trace!("ssdp recv error: {}", e);
                    continue;
                }
                Err(_) => break,
            };

            let text = String::from_utf8_lossy(&buf[..len]);
            let headers = parse_headers(&text);
            let host = addr.ip().to_string();
            if seen_hosts.contains(&host) {
                continue;
            }
            if !is_ac_response(&headers) {
                continue;
            }

            let port = headers
                .get("location")
                .and_then(|l| location_port(l))
                .unwrap_or(80);
            let combined = combined_headers(&headers);
            let brand = guess_brand(&combined);
            let name = clean_ssdp_name(
                headers.get("server").map(String::as_str).unwrap_or(""),
                brand,
                &host,
            );

            debug!("ssdp found {} at {}", name, host);
            seen_hosts.insert(host.clone());
            let mut metadata = Metadata::new();
            for key in ["st", "usn", "location", "server"] {
                if let Some(value) = headers.get(key) {
                    metadata.insert(key.to_string(), Value::from(value.clone()));
                }
            }
            found.push(Candidate {
                host,
                port,
                name,
                brand: brand.map(|b| b.to_string()),
                method: DiscoveryMethod::Ssdp,
                metadata,
            });
        }

        sender.abort();
        Ok(found)
    }
}

fn build_msearch(target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {}\r\n\
         \r\n",
        SSDP_ADDR, SSDP_PORT, target
    )
}

/// Parse SSDP response headers into a lowercase-keyed map
pub(crate) fn parse_headers(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn combined_headers(headers: &HashMap<String, String>) -> String {
    let mut combined = String::new();
    for value in headers.values() {
        combined.push_str(&value.to_lowercase());
        combined.push(' ');
    }
    combined
}

/// Strict allow-list; the catch-all query returns many unrelated devices.
///
/// A response passes on a brand or AC keyword anywhere in its headers,
/// or on a LOCATION URL pointing at a known AC local API.
pub(crate) fn is_ac_response(headers: &HashMap<String, String>) -> bool {
    let combined = combined_headers(headers);
    if AC_KEYWORDS.iter().any(|k| combined.contains(k)) {
        return true;
    }
    headers
        .get("location")
        .is_some_and(|l| AC_PORT_PATHS.iter().any(|p| l.contains(p)))
}

/// Extract the port from a LOCATION header URL
pub(crate) fn location_port(location: &str) -> Option<u16> {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))?;
    let authority = rest.split('/').next()?;
    let (_, port) = authority.rsplit_once(':')?;
    port.parse().ok()
}
