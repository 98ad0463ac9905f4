/*!
 * mDNS service-advertisement scan.
 *
 * Sends PTR queries for a fixed set of AC-related service types on the
 * mDNS multicast group and collects answers until the budget expires.
 * Generic service types (HomeKit, plain HTTP) are kept only when the
 * advertised instance name looks AC-like.
 */
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use smartac_core::types::Value;

use crate::discovery::{clean_device_name, guess_brand, Candidate, DiscoveryMethod, ScanMethod};
use crate::error::Result;

const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_PORT: u16 = 5353;

const TYPE_PTR: u16 = 12;
const TYPE_SRV: u16 = 33;

/// A queried service type and what advertising under it implies
#[derive(Debug, Clone, Copy)]
struct ServiceType {
    service: &'static str,
    /// Brand implied by the service type itself, independent of the
    /// advertised instance name
    brand: Option<&'static str>,
    /// Whether the type alone marks the device as an AC; generic types
    /// are filtered by name keywords instead
    ac_specific: bool,
}

/// Service types queried; the generic ones are filtered by name keywords
const SERVICE_TYPES: [ServiceType; 7] = [
    ServiceType {
        service: "_samsung-ac._tcp.local",
        brand: Some("samsung"),
        ac_specific: true,
    },
    ServiceType {
        service: "_daikin._tcp.local",
        brand: Some("daikin"),
        ac_specific: true,
    },
    ServiceType {
        service: "_lg-smart._tcp.local",
        brand: Some("lg"),
        ac_specific: true,
    },
    ServiceType {
        service: "_midea._tcp.local",
        brand: Some("midea"),
        ac_specific: true,
    },
    ServiceType {
        service: "_haier-ac._tcp.local",
        brand: Some("haier"),
        ac_specific: true,
    },
    ServiceType {
        service: "_aircon._tcp.local",
        brand: None,
        ac_specific: true,
    },
    ServiceType {
        service: "_http._tcp.local",
        brand: None,
        ac_specific: false,
    },
];

fn service_entry(service: &str) -> Option<&'static ServiceType> {
    SERVICE_TYPES.iter().find(|t| t.service == service)
}

/// mDNS scan method
#[derive(Debug, Default)]
pub struct MdnsScan;

impl MdnsScan {
    /// Create an mDNS scan method
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScanMethod for MdnsScan {
    fn name(&self) -> &'static str {
        "mdns"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Mdns
    }

    async fn scan(&self, budget: Duration) -> Result<Vec<Candidate>> {
        let deadline = Instant::now() + budget;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.join_multicast_v4(MDNS_GROUP, Ipv4Addr::UNSPECIFIED)?;

        for service_type in &SERVICE_TYPES {
            let query = build_ptr_query(service_type.service);
            socket.send_to(&query, (MDNS_GROUP, MDNS_PORT)).await?;
        }

        let mut found: Vec<Candidate> = Vec::new();
        let mut seen_hosts = HashSet::new();
        let mut buf = [0u8; 2048];

        // The socket drops (and leaves the group) on every exit path
        loop {
            let (len, addr) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    trace!("mdns recv error: {}", e);
                    continue;
                }
                Err(_) => break,
            };

            let Some(answer) = parse_response(&buf[..len]) else {
                continue;
            };
            let host = addr.ip().to_string();
            if seen_hosts.contains(&host) {
                continue;
            }
            if !accepts(&answer) {
                trace!("mdns answer from {} rejected: {}", host, answer.instance);
                continue;
            }

            let name = clean_device_name(&answer.instance);
            debug!("mdns found {} at {}", name, host);
            seen_hosts.insert(host.clone());
            let mut metadata = smartac_core::types::Metadata::new();
            metadata.insert("service".to_string(), Value::from(answer.service.clone()));
            found.push(Candidate {
                host,
                port: answer.port.unwrap_or(80),
                brand: brand_for(&answer).map(|b| b.to_string()),
                name,
                method: DiscoveryMethod::Mdns,
                metadata,
            });
        }

        Ok(found)
    }
}

/// A parsed mDNS answer of interest
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MdnsAnswer {
    /// The advertised instance name (PTR target)
    pub instance: String,
    /// The service type the instance was advertised under
    pub service: String,
    /// Port from an accompanying SRV record
    pub port: Option<u16>,
}

fn accepts(answer: &MdnsAnswer) -> bool {
    match service_entry(&answer.service) {
        Some(entry) if entry.ac_specific => true,
        _ => name_is_ac_like(&answer.instance),
    }
}

/// Brand from the advertised service type, falling back to the instance
/// name for generic types
fn brand_for(answer: &MdnsAnswer) -> Option<&'static str> {
    service_entry(&answer.service)
        .and_then(|entry| entry.brand)
        .or_else(|| guess_brand(&answer.instance))
}

fn name_is_ac_like(name: &str) -> bool {
    let lower = name.to_lowercase();
    if ["air", "hvac", "climate"].iter().any(|k| lower.contains(k)) {
        return true;
    }
    if guess_brand(&lower).is_some() {
        return true;
    }
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "ac")
}

/// Build a standard PTR query for a service type
pub(crate) fn build_ptr_query(service: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(12 + service.len() + 6);
    // Header: id 0, no flags, one question
    packet.extend_from_slice(&[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
    for label in service.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);
    packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
    packet.extend_from_slice(&1u16.to_be_bytes()); // class IN
    packet
}

/// Parse a response packet into the first PTR answer plus any SRV port.
///
/// Handles name compression; returns None for queries, truncated
/// packets and answers without a PTR record.
pub(crate) fn parse_response(buf: &[u8]) -> Option<MdnsAnswer> {
    if buf.len() < 12 {
        return None;
    }
    let flags = u16::from_be_bytes([buf[2], buf[3]]);
    if flags & 0x8000 == 0 {
        // A query, not a response
        return None;
    }
    let qdcount = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let ancount = u16::from_be_bytes([buf[6], buf[7]]) as usize;
    let nscount = u16::from_be_bytes([buf[8], buf[9]]) as usize;
    let arcount = u16::from_be_bytes([buf[10], buf[11]]) as usize;

    let mut pos = 12;
    for _ in 0..qdcount {
        (_, pos) = read_name(buf, pos)?;
        pos = pos.checked_add(4)?;
    }

    let mut ptr: Option<(String, String)> = None;
    let mut srv_port: Option<u16> = None;

    for _ in 0..(ancount + nscount + arcount) {
        let (owner, after_name) = read_name(buf, pos)?;
        pos = after_name;
        if buf.len() < pos + 10 {
            return None;
        }
        let rtype = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        let rdlen = u16::from_be_bytes([buf[pos + 8], buf[pos + 9]]) as usize;
        pos += 10;
        if buf.len() < pos + rdlen {
            return None;
        }

        match rtype {
            TYPE_PTR => {
                if ptr.is_none() {
                    let (target, _) = read_name(buf, pos)?;
                    ptr = Some((target, owner));
                }
            }
            TYPE_SRV if rdlen >= 6 => {
                srv_port = Some(u16::from_be_bytes([buf[pos + 4], buf[pos + 5]]));
            }
            _ => {}
        }
        pos += rdlen;
    }

    ptr.map(|(instance, service)| MdnsAnswer {
        instance,
        service,
        port: srv_port,
    })
}

/// Read a (possibly compressed) DNS name, returning it and the offset
/// just past its in-place encoding
fn read_name(buf: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut after: Option<usize> = None;
    let mut jumps = 0;

    loop {
        let len = *buf.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        if len & 0xC0 == 0xC0 {
            // Compression pointer
            let target = (((len & 0x3F) << 8) | *buf.get(pos + 1)? as usize) & 0x3FFF;
            if after.is_none() {
                after = Some(pos + 2);
            }
            jumps += 1;
            if jumps > 16 {
                return None;
            }
            pos = target;
            continue;
        }
        let end = pos + 1 + len;
        let label = buf.get(pos + 1..end)?;
        labels.push(String::from_utf8_lossy(label).to_string());
        pos = end;
    }

    Some((labels.join("."), after.unwrap_or(pos)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_name(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for label in name.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    /// Build a response with one PTR answer and one SRV answer
    fn build_response(service: &str, instance: &str, port: u16) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&[0, 0, 0x84, 0, 0, 0, 0, 2, 0, 0, 0, 0]);

        // PTR: service -> instance
        packet.extend_from_slice(&encode_name(service));
        packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
        packet.extend_from_slice(&1u16.to_be_bytes());
        packet.extend_from_slice(&120u32.to_be_bytes());
        let rdata = encode_name(instance);
        packet.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        packet.extend_from_slice(&rdata);

        // SRV: priority, weight, port, target
        packet.extend_from_slice(&encode_name(instance));
        packet.extend_from_slice(&TYPE_SRV.to_be_bytes());
        packet.extend_from_slice(&1u16.to_be_bytes());
        packet.extend_from_slice(&120u32.to_be_bytes());
        let mut srv = Vec::new();
        srv.extend_from_slice(&0u16.to_be_bytes());
        srv.extend_from_slice(&0u16.to_be_bytes());
        srv.extend_from_slice(&port.to_be_bytes());
        srv.extend_from_slice(&encode_name("unit.local"));
        packet.extend_from_slice(&(srv.len() as u16).to_be_bytes());
        packet.extend_from_slice(&srv);

        packet
    }

    #[test]
    fn test_parse_ptr_and_srv() {
        let packet = build_response(
            "_aircon._tcp.local",
            "Living Room AC._aircon._tcp.local",
            5000,
        );
        let answer = parse_response(&packet).unwrap();
        assert_eq!(answer.service, "_aircon._tcp.local");
        assert!(answer.instance.starts_with("Living Room AC"));
        assert_eq!(answer.port, Some(5000));
    }

    #[test]
    fn test_parse_rejects_queries_and_garbage() {
        let query = build_ptr_query("_airconditioner._tcp.local");
        assert!(parse_response(&query).is_none());
        assert!(parse_response(&[0u8; 4]).is_none());
        assert!(parse_response(&[0xFFu8; 13]).is_none());
    }

    #[test]
    fn test_parse_handles_compression() {
        // Header, one answer whose PTR rdata is a pointer to offset 12
        let mut packet = Vec::new();
        packet.extend_from_slice(&[0, 0, 0x84, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        packet.extend_from_slice(&encode_name("_hap._tcp.local"));
        packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
        packet.extend_from_slice(&1u16.to_be_bytes());
        packet.extend_from_slice(&120u32.to_be_bytes());
        packet.extend_from_slice(&2u16.to_be_bytes());
        packet.extend_from_slice(&[0xC0, 12]);

        let answer = parse_response(&packet).unwrap();
        assert_eq!(answer.instance, "_hap._tcp.local");
    }

    #[test]
    fn test_generic_service_filtered_by_keywords() {
        let printer = MdnsAnswer {
            instance: "Office Printer._http._tcp.local".to_string(),
            service: "_http._tcp.local".to_string(),
            port: None,
        };
        assert!(!accepts(&printer));

        let ac = MdnsAnswer {
            instance: "Bedroom Aircon._http._tcp.local".to_string(),
            service: "_http._tcp.local".to_string(),
            port: None,
        };
        assert!(accepts(&ac));

        let branded = MdnsAnswer {
            instance: "Daikin-123ABC._http._tcp.local".to_string(),
            service: "_http._tcp.local".to_string(),
            port: None,
        };
        assert!(accepts(&branded));

        // AC-specific service types need no keyword in the instance name
        let specific = MdnsAnswer {
            instance: "X1".to_string(),
            service: "_lg-smart._tcp.local".to_string(),
            port: None,
        };
        assert!(accepts(&specific));
    }

    #[test]
    fn test_brand_carried_by_service_type() {
        // A neutral instance name still gets the brand the service implies
        let neutral = MdnsAnswer {
            instance: "Living Room._daikin._tcp.local".to_string(),
            service: "_daikin._tcp.local".to_string(),
            port: None,
        };
        assert!(accepts(&neutral));
        assert_eq!(brand_for(&neutral), Some("daikin"));

        // Generic types fall back to the instance name
        let generic = MdnsAnswer {
            instance: "Gree-AC-82._http._tcp.local".to_string(),
            service: "_http._tcp.local".to_string(),
            port: None,
        };
        assert_eq!(brand_for(&generic), Some("gree"));

        let unbranded = MdnsAnswer {
            instance: "Bedroom Aircon._aircon._tcp.local".to_string(),
            service: "_aircon._tcp.local".to_string(),
            port: None,
        };
        assert_eq!(brand_for(&unbranded), None);
    }

    #[test]
    fn test_ac_word_boundary() {
        assert!(name_is_ac_like("living room ac"));
        assert!(!name_is_ac_like("macbook pro"));
    }
}
