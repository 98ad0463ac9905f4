/*!
 * Transport registry.
 *
 * The single source of truth for "how do I reach device X right now".
 * Owns one connection record and one health record per registered
 * device, selects a transport deterministically from configuration and
 * health, and performs the one defined failover hop (local to cloud).
 *
 * Operations on different devices run concurrently; operations on the
 * same device are serialized through a per-device lock so adapter
 * session state and health counters never interleave.
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use smartac_core::config::LinkConfig;
use smartac_core::types::{Id, Metadata, Value};
use smartac_core::utils::{millis_to_duration, with_timeout};

use crate::adapter::AcAdapter;
use crate::adapters::{self, DEFAULT_ADAPTER_TIMEOUT};
use crate::cloud::CloudStrategy;
use crate::error::{LinkError, Result};
use crate::ir::IrController;
use crate::vocab::{AcStatus, Command};

/// Consecutive failures before a transport's healthy flag drops.
///
/// Policy constant; paired with the immediate reset on success it keeps
/// transport selection from oscillating on single transient errors.
pub const UNHEALTHY_THRESHOLD: u32 = 3;

/// The four channels through which a device can be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Local network (brand HTTP APIs over Wi-Fi)
    #[serde(rename = "wifi")]
    Local,
    /// Bluetooth Low Energy
    #[serde(rename = "ble")]
    Ble,
    /// Vendor cloud
    #[serde(rename = "cloud")]
    Cloud,
    /// Infrared blaster (send-only)
    #[serde(rename = "ir")]
    Ir,
}

/// Fixed transport priority for `auto` selection
pub const TRANSPORT_PRIORITY: [TransportKind; 4] = [
    TransportKind::Local,
    TransportKind::Ble,
    TransportKind::Cloud,
    TransportKind::Ir,
];

impl TransportKind {
    /// The wire name for this transport
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Local => "wifi",
            TransportKind::Ble => "ble",
            TransportKind::Cloud => "cloud",
            TransportKind::Ir => "ir",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferred transport in a device's configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredTransport {
    /// Pick by priority and health
    #[default]
    Auto,
    /// Always local network
    #[serde(rename = "wifi", alias = "local", alias = "wifi_local")]
    Local,
    /// Always Bluetooth Low Energy
    #[serde(alias = "bluetooth")]
    Ble,
    /// Always cloud
    Cloud,
    /// Always infrared
    #[serde(alias = "infrared")]
    Ir,
}

impl PreferredTransport {
    /// Normalize a configuration string, accepting the common aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(PreferredTransport::Auto),
            "wifi" | "local" | "wifi_local" => Some(PreferredTransport::Local),
            "ble" | "bluetooth" => Some(PreferredTransport::Ble),
            "cloud" => Some(PreferredTransport::Cloud),
            "ir" | "infrared" => Some(PreferredTransport::Ir),
            _ => None,
        }
    }

    /// The explicit transport, if not `auto`
    pub fn kind(&self) -> Option<TransportKind> {
        match self {
            PreferredTransport::Auto => None,
            PreferredTransport::Local => Some(TransportKind::Local),
            PreferredTransport::Ble => Some(TransportKind::Ble),
            PreferredTransport::Cloud => Some(TransportKind::Cloud),
            PreferredTransport::Ir => Some(TransportKind::Ir),
        }
    }
}

/// Per-device connection configuration supplied at registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    /// Local network address
    pub host: Option<String>,
    /// Local port; adapters fall back to the brand's well-known port
    pub port: Option<u16>,
    /// Brand key (e.g. "daikin", "samsung", or an OEM alias)
    pub brand: String,
    /// Device identifier in the vendor cloud; defaults to the registry
    /// id when the preferred transport is cloud
    pub cloud_id: Option<String>,
    /// Identifier of the IR blaster covering this device
    pub ir_blaster_id: Option<String>,
    /// Preferred transport
    pub preferred: PreferredTransport,
    /// Adapter-specific options (e.g. Samsung pairing token)
    pub options: Metadata,
}

/// Health state of one transport for one device
#[derive(Debug, Clone, Serialize)]
pub struct HealthEntry {
    /// Whether configuration makes this transport usable at all
    pub available: bool,
    /// Healthy flag, with the hysteresis described on the registry
    pub healthy: bool,
    /// Consecutive failures since the last success
    pub fail_count: u32,
    /// When this transport was last attempted
    pub last_check: Option<DateTime<Utc>>,
}

impl HealthEntry {
    fn new(available: bool, healthy: bool) -> Self {
        Self {
            available,
            healthy,
            fail_count: 0,
            last_check: None,
        }
    }
}

/// Transport health record for one device, all four kinds always present
#[derive(Debug, Clone)]
pub struct TransportHealth {
    entries: HashMap<TransportKind, HealthEntry>,
}

impl TransportHealth {
    /// Derive availability from the device configuration.
    ///
    /// Cloud starts healthy even before first contact; the optimistic
    /// default makes it the universal fallback in priority order.
    pub fn new(config: &DeviceConfig) -> Self {
        let cloud_available =
            config.cloud_id.is_some() || config.preferred == PreferredTransport::Cloud;
        let mut entries = HashMap::new();
        entries.insert(
            TransportKind::Local,
            HealthEntry::new(config.host.is_some(), false),
        );
        entries.insert(TransportKind::Ble, HealthEntry::new(false, false));
        entries.insert(TransportKind::Cloud, HealthEntry::new(cloud_available, true));
        entries.insert(
            TransportKind::Ir,
            HealthEntry::new(config.ir_blaster_id.is_some(), false),
        );
        Self { entries }
    }

    /// The entry for a transport kind
    pub fn get(&self, kind: TransportKind) -> &HealthEntry {
        // All four kinds are inserted at construction
        self.entries.get(&kind).unwrap_or(&MISSING_ENTRY)
    }

    /// Record a successful contact: reset the count, flip healthy on
    pub fn mark_success(&mut self, kind: TransportKind) {
        if let Some(entry) = self.entries.get_mut(&kind) {
            entry.healthy = true;
            entry.fail_count = 0;
            entry.last_check = Some(Utc::now());
        }
    }

    /// Record a failed contact; healthy drops only at the threshold
    pub fn mark_failure(&mut self, kind: TransportKind) {
        if let Some(entry) = self.entries.get_mut(&kind) {
            entry.fail_count += 1;
            entry.last_check = Some(Utc::now());
            if entry.fail_count >= UNHEALTHY_THRESHOLD {
                entry.healthy = false;
            }
        }
    }

    fn snapshot(&self) -> HashMap<String, HealthEntry> {
        self.entries
            .iter()
            .map(|(kind, entry)| (kind.as_str().to_string(), entry.clone()))
            .collect()
    }
}

static MISSING_ENTRY: HealthEntry = HealthEntry {
    available: false,
    healthy: false,
    fail_count: 0,
    last_check: None,
};

/// Pick the transport for a device given its configuration and health.
///
/// An explicit preference always wins. Under `auto`, transports are
/// scanned in fixed priority order and the first one that is available
/// and not past the failure threshold is chosen; cloud is the default
/// when nothing qualifies.
pub fn select_transport(config: &DeviceConfig, health: &TransportHealth) -> TransportKind {
    if let Some(kind) = config.preferred.kind() {
        return kind;
    }
    for kind in TRANSPORT_PRIORITY {
        let entry = health.get(kind);
        if entry.available && (entry.healthy || entry.fail_count < UNHEALTHY_THRESHOLD) {
            return kind;
        }
    }
    TransportKind::Cloud
}

/// The transport a completed operation actually used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportedTransport {
    /// Local network, first attempt
    #[serde(rename = "wifi")]
    Local,
    /// Bluetooth Low Energy
    #[serde(rename = "ble")]
    Ble,
    /// Cloud, selected as the primary transport
    #[serde(rename = "cloud")]
    Cloud,
    /// Cloud, reached via the local-to-cloud failover hop
    #[serde(rename = "cloud_fallback")]
    CloudFallback,
    /// Infrared blaster
    #[serde(rename = "ir")]
    Ir,
}

impl ReportedTransport {
    /// The wire name, including the distinguished fallback label
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportedTransport::Local => "wifi",
            ReportedTransport::Ble => "ble",
            ReportedTransport::Cloud => "cloud",
            ReportedTransport::CloudFallback => "cloud_fallback",
            ReportedTransport::Ir => "ir",
        }
    }
}

/// A status read, tagged with the transport that produced it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// The device identifier
    pub device: Id,
    /// The transport that produced the status
    pub transport: ReportedTransport,
    /// The normalized status
    pub status: AcStatus,
}

/// Result envelope for a command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    /// Always true; failures surface as errors instead
    pub success: bool,
    /// The transport the command went through
    pub transport: ReportedTransport,
    /// The device identifier
    pub device: Id,
    /// The canonical command name
    pub command: String,
    /// The command value
    pub value: Value,
    /// Adapter- or strategy-specific result payload
    pub result: Value,
}

/// Snapshot of one device's configuration and transport health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    /// Brand key
    pub brand: String,
    /// Local network address, if configured
    pub host: Option<String>,
    /// Preferred transport
    pub preferred: PreferredTransport,
    /// The transport the next operation would use
    pub active: TransportKind,
    /// Whether a local adapter session is currently established
    pub connected: bool,
    /// Last successful contact over any transport
    pub last_seen: Option<DateTime<Utc>>,
    /// Per-transport health, keyed by wire name
    pub transports: HashMap<String, HealthEntry>,
}

/// Factory for local protocol adapters; injectable for tests
pub type AdapterFactory = Arc<
    dyn Fn(&str, &str, Option<u16>, &Metadata, Duration) -> Result<Box<dyn AcAdapter>>
        + Send
        + Sync,
>;

struct DeviceEntry {
    config: DeviceConfig,
    adapter: Option<Box<dyn AcAdapter>>,
    connected: bool,
    last_seen: Option<DateTime<Utc>>,
    health: TransportHealth,
}

/// The transport registry.
///
/// Cloud and infrared collaborators are injected at construction; their
/// absence surfaces as [`LinkError::MissingCollaborator`] only when the
/// corresponding transport is actually selected.
pub struct TransportRegistry {
    devices: RwLock<HashMap<Id, Arc<Mutex<DeviceEntry>>>>,
    cloud: Option<Arc<dyn CloudStrategy>>,
    ir: Option<Arc<dyn IrController>>,
    factory: AdapterFactory,
    adapter_timeout: Duration,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("cloud", &self.cloud.is_some())
            .field("ir", &self.ir.is_some())
            .field("adapter_timeout", &self.adapter_timeout)
            .finish()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    /// Create a registry with no cloud or infrared collaborators
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            cloud: None,
            ir: None,
            factory: Arc::new(|brand, host, port, options, timeout| {
                adapters::create_adapter(brand, host, port, options, timeout)
            }),
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    /// Create a registry with timeouts taken from the link configuration
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new().with_adapter_timeout(millis_to_duration(config.adapter_timeout_ms))
    }

    /// Inject the cloud strategy
    pub fn with_cloud(mut self, cloud: Arc<dyn CloudStrategy>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Inject the infrared controller
    pub fn with_ir(mut self, ir: Arc<dyn IrController>) -> Self {
        self.ir = Some(ir);
        self
    }

    /// Replace the local adapter factory
    pub fn with_adapter_factory(mut self, factory: AdapterFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Override the per-request timeout handed to local adapters
    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Register a device; a repeated registration replaces the record
    pub async fn register(&self, id: Id, config: DeviceConfig) {
        let health = TransportHealth::new(&config);
        info!(
            "Registered device {} (brand: {}, preferred: {:?})",
            id, config.brand, config.preferred
        );
        let entry = DeviceEntry {
            config,
            adapter: None,
            connected: false,
            last_seen: None,
            health,
        };
        let mut devices = self.devices.write().await;
        devices.insert(id, Arc::new(Mutex::new(entry)));
    }

    /// Remove a device, disconnecting its adapter first
    pub async fn unregister(&self, id: &Id) -> Result<()> {
        let removed = {
            let mut devices = self.devices.write().await;
            devices.remove(id)
        };
        let handle = removed.ok_or_else(|| LinkError::NotRegistered(id.to_string()))?;
        let mut entry = handle.lock().await;
        entry.connected = false;
        if let Some(adapter) = entry.adapter.take() {
            if let Err(e) = adapter.disconnect().await {
                warn!("Disconnect during unregister of {} reported: {}", id, e);
            }
        }
        info!("Unregistered device {}", id);
        Ok(())
    }

    async fn entry(&self, id: &Id) -> Result<Arc<Mutex<DeviceEntry>>> {
        let devices = self.devices.read().await;
        devices
            .get(id)
            .cloned()
            .ok_or_else(|| LinkError::NotRegistered(id.to_string()))
    }

    /// The transport a status or command call would use right now
    pub async fn active_transport(&self, id: &Id) -> Result<TransportKind> {
        let handle = self.entry(id).await?;
        let entry = handle.lock().await;
        Ok(select_transport(&entry.config, &entry.health))
    }

    /// Read the device status over the active transport.
    ///
    /// A local failure falls back to cloud exactly once when a cloud
    /// strategy is present; infrared reads return a fixed placeholder
    /// since the channel is send-only.
    pub async fn get_status(&self, id: &Id) -> Result<StatusReport> {
        let handle = self.entry(id).await?;
        let mut entry = handle.lock().await;
        let kind = select_transport(&entry.config, &entry.health);
        debug!("Status read for {} over {}", id, kind);

        match kind {
            TransportKind::Local => match self.local_get_status(&mut entry).await {
                Ok(status) => {
                    entry.health.mark_success(TransportKind::Local);
                    entry.last_seen = Some(Utc::now());
                    Ok(StatusReport {
                        device: id.clone(),
                        transport: ReportedTransport::Local,
                        status,
                    })
                }
                Err(primary) => {
                    entry.health.mark_failure(TransportKind::Local);
                    let Some(cloud) = self.cloud.clone() else {
                        return Err(primary);
                    };
                    warn!("Local status read failed for {}, trying cloud: {}", id, primary);
                    let cloud_id = cloud_id_for(id, &entry.config);
                    match cloud.get_status(&cloud_id).await {
                        Ok(status) => {
                            entry.health.mark_success(TransportKind::Cloud);
                            entry.last_seen = Some(Utc::now());
                            Ok(StatusReport {
                                device: id.clone(),
                                transport: ReportedTransport::CloudFallback,
                                status,
                            })
                        }
                        Err(fallback) => {
                            entry.health.mark_failure(TransportKind::Cloud);
                            Err(LinkError::AllTransportsFailed {
                                device: id.to_string(),
                                primary: primary.to_string(),
                                fallback: fallback.to_string(),
                            })
                        }
                    }
                }
            },
            TransportKind::Cloud => {
                let cloud = self.require_cloud()?;
                let cloud_id = cloud_id_for(id, &entry.config);
                match cloud.get_status(&cloud_id).await {
                    Ok(status) => {
                        entry.health.mark_success(TransportKind::Cloud);
                        entry.last_seen = Some(Utc::now());
                        Ok(StatusReport {
                            device: id.clone(),
                            transport: ReportedTransport::Cloud,
                            status,
                        })
                    }
                    Err(e) => {
                        entry.health.mark_failure(TransportKind::Cloud);
                        Err(e)
                    }
                }
            }
            TransportKind::Ir => Ok(StatusReport {
                device: id.clone(),
                transport: ReportedTransport::Ir,
                status: AcStatus::ir_unavailable(),
            }),
            TransportKind::Ble => Err(LinkError::UnsupportedTransport(
                "ble transport has no adapter implementation".to_string(),
            )),
        }
    }

    /// Send a generic `(name, value)` command over the active transport
    pub async fn send_command(&self, id: &Id, name: &str, value: &Value) -> Result<CommandOutcome> {
        let command = Command::parse(name, value)?;
        let handle = self.entry(id).await?;
        let mut entry = handle.lock().await;
        let kind = select_transport(&entry.config, &entry.health);
        debug!("Command {} for {} over {}", command.name(), id, kind);

        let outcome = |transport: ReportedTransport, result: Value| CommandOutcome {
            success: true,
            transport,
            device: id.clone(),
            command: command.name().to_string(),
            value: command.value(),
            result,
        };

        match kind {
            TransportKind::Local => match self.local_execute(&mut entry, &command).await {
                Ok(result) => {
                    entry.health.mark_success(TransportKind::Local);
                    entry.last_seen = Some(Utc::now());
                    Ok(outcome(ReportedTransport::Local, result))
                }
                Err(primary) => {
                    entry.health.mark_failure(TransportKind::Local);
                    let Some(cloud) = self.cloud.clone() else {
                        return Err(primary);
                    };
                    warn!("Local command failed for {}, trying cloud: {}", id, primary);
                    let cloud_id = cloud_id_for(id, &entry.config);
                    match cloud.send_command(&cloud_id, &command).await {
                        Ok(result) => {
                            entry.health.mark_success(TransportKind::Cloud);
                            entry.last_seen = Some(Utc::now());
                            Ok(outcome(ReportedTransport::CloudFallback, result))
                        }
                        Err(fallback) => {
                            entry.health.mark_failure(TransportKind::Cloud);
                            Err(LinkError::AllTransportsFailed {
                                device: id.to_string(),
                                primary: primary.to_string(),
                                fallback: fallback.to_string(),
                            })
                        }
                    }
                }
            },
            TransportKind::Cloud => {
                let cloud = self.require_cloud()?;
                let cloud_id = cloud_id_for(id, &entry.config);
                match cloud.send_command(&cloud_id, &command).await {
                    Ok(result) => {
                        entry.health.mark_success(TransportKind::Cloud);
                        entry.last_seen = Some(Utc::now());
                        Ok(outcome(ReportedTransport::Cloud, result))
                    }
                    Err(e) => {
                        entry.health.mark_failure(TransportKind::Cloud);
                        Err(e)
                    }
                }
            }
            TransportKind::Ir => {
                let ir = self.ir.clone().ok_or_else(|| {
                    LinkError::MissingCollaborator("infrared controller".to_string())
                })?;
                let blaster = entry.config.ir_blaster_id.clone().ok_or_else(|| {
                    LinkError::TransportUnavailable(format!(
                        "{} has no IR blaster configured",
                        id
                    ))
                })?;
                match ir.send(&blaster, &entry.config.brand, &command).await {
                    Ok(result) => {
                        entry.health.mark_success(TransportKind::Ir);
                        entry.last_seen = Some(Utc::now());
                        Ok(outcome(ReportedTransport::Ir, result))
                    }
                    Err(e) => {
                        entry.health.mark_failure(TransportKind::Ir);
                        Err(e)
                    }
                }
            }
            TransportKind::Ble => Err(LinkError::UnsupportedTransport(
                "ble transport has no adapter implementation".to_string(),
            )),
        }
    }

    /// Snapshot of configuration and health for every registered device
    pub async fn connection_status(&self) -> HashMap<String, ConnectionSnapshot> {
        let handles: Vec<(Id, Arc<Mutex<DeviceEntry>>)> = {
            let devices = self.devices.read().await;
            devices
                .iter()
                .map(|(id, handle)| (id.clone(), handle.clone()))
                .collect()
        };

        let mut out = HashMap::new();
        for (id, handle) in handles {
            let entry = handle.lock().await;
            out.insert(
                id.to_string(),
                ConnectionSnapshot {
                    brand: entry.config.brand.clone(),
                    host: entry.config.host.clone(),
                    preferred: entry.config.preferred,
                    active: select_transport(&entry.config, &entry.health),
                    connected: entry.connected,
                    last_seen: entry.last_seen,
                    transports: entry.health.snapshot(),
                },
            );
        }
        out
    }

    /// Tear down a device's local adapter session.
    ///
    /// Always leaves the device marked disconnected; a failing adapter
    /// teardown is logged, not propagated.
    pub async fn disconnect_device(&self, id: &Id) -> Result<()> {
        let handle = self.entry(id).await?;
        let mut entry = handle.lock().await;
        entry.connected = false;
        if let Some(adapter) = entry.adapter.take() {
            if let Err(e) = adapter.disconnect().await {
                warn!("Disconnect for {} reported: {}", id, e);
            }
        }
        debug!("Disconnected device {}", id);
        Ok(())
    }

    /// Tear down every device's local adapter session
    pub async fn disconnect_all(&self) -> Result<()> {
        let ids: Vec<Id> = {
            let devices = self.devices.read().await;
            devices.keys().cloned().collect()
        };
        for id in ids {
            self.disconnect_device(&id).await?;
        }
        Ok(())
    }

    fn require_cloud(&self) -> Result<Arc<dyn CloudStrategy>> {
        self.cloud
            .clone()
            .ok_or_else(|| LinkError::MissingCollaborator("cloud strategy".to_string()))
    }

    async fn local_get_status(&self, entry: &mut DeviceEntry) -> Result<AcStatus> {
        self.ensure_connected(entry).await?;
        let adapter = entry
            .adapter
            .as_ref()
            .ok_or_else(|| LinkError::Other("adapter missing after connect".to_string()))?;
        adapter.get_status().await
    }

    async fn local_execute(&self, entry: &mut DeviceEntry, command: &Command) -> Result<Value> {
        self.ensure_connected(entry).await?;
        let adapter = entry
            .adapter
            .as_ref()
            .ok_or_else(|| LinkError::Other("adapter missing after connect".to_string()))?;
        adapter.execute(command).await
    }

    /// Lazily create the local adapter and establish its session once
    async fn ensure_connected(&self, entry: &mut DeviceEntry) -> Result<()> {
        let host = entry.config.host.clone().ok_or_else(|| {
            LinkError::TransportUnavailable("no local address configured".to_string())
        })?;
        if entry.adapter.is_none() {
            let adapter = (self.factory)(
                &entry.config.brand,
                &host,
                entry.config.port,
                &entry.config.options,
                self.adapter_timeout,
            )?;
            entry.adapter = Some(adapter);
            entry.connected = false;
        }
        if !entry.connected {
            let adapter = entry
                .adapter
                .as_ref()
                .ok_or_else(|| LinkError::Other("adapter missing after creation".to_string()))?;
            with_timeout(self.adapter_timeout, adapter.connect()).await?;
            entry.connected = true;
        }
        Ok(())
    }
}

fn cloud_id_for(id: &Id, config: &DeviceConfig) -> String {
    config
        .cloud_id
        .clone()
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>, cloud_id: Option<&str>, preferred: PreferredTransport) -> DeviceConfig {
        DeviceConfig {
            host: host.map(|s| s.to_string()),
            port: None,
            brand: "daikin".to_string(),
            cloud_id: cloud_id.map(|s| s.to_string()),
            ir_blaster_id: None,
            preferred,
            options: Metadata::new(),
        }
    }

    #[test]
    fn test_preferred_transport_aliases() {
        assert_eq!(PreferredTransport::parse("auto"), Some(PreferredTransport::Auto));
        assert_eq!(PreferredTransport::parse("wifi_local"), Some(PreferredTransport::Local));
        assert_eq!(PreferredTransport::parse("LOCAL"), Some(PreferredTransport::Local));
        assert_eq!(PreferredTransport::parse("bluetooth"), Some(PreferredTransport::Ble));
        assert_eq!(PreferredTransport::parse("infrared"), Some(PreferredTransport::Ir));
        assert_eq!(PreferredTransport::parse("carrier-pigeon"), None);
    }

    #[test]
    fn test_explicit_preference_always_wins() {
        let cfg = config(None, None, PreferredTransport::Ir);
        let health = TransportHealth::new(&cfg);
        assert_eq!(select_transport(&cfg, &health), TransportKind::Ir);
    }

    #[test]
    fn test_auto_with_nothing_available_defaults_to_cloud() {
        let cfg = config(None, None, PreferredTransport::Auto);
        let health = TransportHealth::new(&cfg);
        assert_eq!(select_transport(&cfg, &health), TransportKind::Cloud);
    }

    #[test]
    fn test_auto_prefers_local_when_configured() {
        let cfg = config(Some("192.168.1.50"), Some("c1"), PreferredTransport::Auto);
        let health = TransportHealth::new(&cfg);
        assert_eq!(select_transport(&cfg, &health), TransportKind::Local);
    }

    #[test]
    fn test_local_skipped_once_past_failure_threshold() {
        let cfg = config(Some("192.168.1.50"), Some("c1"), PreferredTransport::Auto);
        let mut health = TransportHealth::new(&cfg);

        for _ in 0..UNHEALTHY_THRESHOLD {
            health.mark_failure(TransportKind::Local);
        }
        assert!(!health.get(TransportKind::Local).healthy);
        assert_eq!(select_transport(&cfg, &health), TransportKind::Cloud);
    }

    #[test]
    fn test_health_hysteresis() {
        let cfg = config(Some("192.168.1.50"), None, PreferredTransport::Auto);
        let mut health = TransportHealth::new(&cfg);

        health.mark_success(TransportKind::Local);
        assert!(health.get(TransportKind::Local).healthy);

        // Two failures keep healthy intact
        health.mark_failure(TransportKind::Local);
        health.mark_failure(TransportKind::Local);
        assert!(health.get(TransportKind::Local).healthy);
        assert_eq!(health.get(TransportKind::Local).fail_count, 2);

        // Third failure drops it
        health.mark_failure(TransportKind::Local);
        assert!(!health.get(TransportKind::Local).healthy);

        // One success resets fully
        health.mark_success(TransportKind::Local);
        assert!(health.get(TransportKind::Local).healthy);
        assert_eq!(health.get(TransportKind::Local).fail_count, 0);
    }

    #[test]
    fn test_cloud_starts_healthy_before_first_contact() {
        let cfg = config(None, Some("c1"), PreferredTransport::Auto);
        let health = TransportHealth::new(&cfg);
        let cloud = health.get(TransportKind::Cloud);
        assert!(cloud.available);
        assert!(cloud.healthy);
        assert!(cloud.last_check.is_none());
    }

    #[tokio::test]
    async fn test_active_transport_requires_registration() {
        let registry = TransportRegistry::new();
        let err = registry
            .active_transport(&Id::from_string("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_cloud_only_device_selects_cloud() {
        let registry = TransportRegistry::new();
        let id = Id::from_string("d1");
        registry
            .register(id.clone(), config(None, Some("cloud-d1"), PreferredTransport::Auto))
            .await;
        assert_eq!(
            registry.active_transport(&id).await.unwrap(),
            TransportKind::Cloud
        );
    }

    #[tokio::test]
    async fn test_cloud_without_strategy_is_a_configuration_error() {
        let registry = TransportRegistry::new();
        let id = Id::from_string("d1");
        registry
            .register(id.clone(), config(None, Some("cloud-d1"), PreferredTransport::Cloud))
            .await;
        let err = registry.get_status(&id).await.unwrap_err();
        assert!(matches!(err, LinkError::MissingCollaborator(_)));
    }

    #[tokio::test]
    async fn test_ir_status_returns_placeholder() {
        let registry = TransportRegistry::new();
        let id = Id::from_string("ir-unit");
        let mut cfg = config(None, None, PreferredTransport::Ir);
        cfg.ir_blaster_id = Some("blaster-1".to_string());
        registry.register(id.clone(), cfg).await;

        let report = registry.get_status(&id).await.unwrap();
        assert_eq!(report.transport, ReportedTransport::Ir);
        assert_eq!(report.status.power, crate::vocab::Power::Unknown);
        assert!(report.status.note.is_some());
    }

    #[tokio::test]
    async fn test_connection_status_snapshot() {
        let registry = TransportRegistry::new();
        registry
            .register(
                Id::from_string("d1"),
                config(Some("192.168.1.50"), None, PreferredTransport::Auto),
            )
            .await;

        let snapshot = registry.connection_status().await;
        let d1 = snapshot.get("d1").unwrap();
        assert_eq!(d1.brand, "daikin");
        assert_eq!(d1.active, TransportKind::Local);
        assert!(!d1.connected);
        assert!(d1.transports.get("wifi").unwrap().available);
        assert!(!d1.transports.get("ble").unwrap().available);
        assert!(d1.transports.get("cloud").unwrap().healthy);
    }
}
