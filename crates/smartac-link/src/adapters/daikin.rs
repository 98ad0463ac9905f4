/*!
 * Daikin local protocol adapter.
 *
 * Daikin units expose a plain HTTP API on port 80 with key=value
 * responses (`ret=OK,pow=1,mode=3,...`). Endpoints:
 *
 * - `/common/basic_info` - device info, MAC, firmware
 * - `/aircon/get_control_info` - power, target temp, mode, fan, swing
 * - `/aircon/get_sensor_info` - room/outdoor temperature, humidity
 * - `/aircon/set_control_info` - write control state
 *
 * Set operations must re-send the full control state, so the adapter
 * caches the last control info and merges each change into it.
 */
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use smartac_core::types::Value;

use crate::adapter::AcAdapter;
use crate::error::{LinkError, Result};
use crate::vocab::{AcMode, AcStatus, Capabilities, Power, TempRange, Temperatures};

/// Control parameters required by `set_control_info`
const REQUIRED_CONTROL_KEYS: [&str; 6] = ["pow", "mode", "stemp", "shum", "f_rate", "f_dir"];

/// Optional control parameters forwarded when present
const OPTIONAL_CONTROL_KEYS: [&str; 3] = ["en_econo", "en_powerful", "adv"];

/// Daikin local HTTP adapter
pub struct DaikinAdapter {
    host: String,
    base_url: String,
    client: reqwest::Client,
    session: RwLock<Session>,
}

#[derive(Debug, Default)]
struct Session {
    /// Last control info read from or written to the unit
    control: HashMap<String, String>,
    /// Basic info captured at connect time
    device_info: HashMap<String, String>,
    connected: bool,
}

impl fmt::Debug for DaikinAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaikinAdapter")
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DaikinAdapter {
    /// Create a new adapter for a unit at `host:port`
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LinkError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.to_string(),
            base_url: format!("http://{}:{}", host, port),
            client,
            session: RwLock::new(Session::default()),
        })
    }

    async fn http_get(&self, path: &str) -> Result<HashMap<String, String>> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LinkError::from_http(&format!("Daikin GET {}", path), e))?;
        let text = res
            .text()
            .await
            .map_err(|e| LinkError::from_http(&format!("Daikin GET {}", path), e))?;
        Ok(parse_kv_response(&text))
    }

    /// Basic info captured at connect time (model, MAC, firmware)
    pub async fn device_info(&self) -> HashMap<String, String> {
        let session = self.session.read().await;
        session.device_info.clone()
    }

    /// Merge a change into the cached control state and write it back.
    async fn set_control(&self, changes: &[(&str, String)]) -> Result<Value> {
        let mut params = {
            let session = self.session.read().await;
            session.control.clone()
        };
        for (key, value) in changes {
            params.insert((*key).to_string(), value.clone());
        }

        let mut query: Vec<(&str, String)> = Vec::new();
        for key in REQUIRED_CONTROL_KEYS.iter().chain(OPTIONAL_CONTROL_KEYS.iter()) {
            if let Some(value) = params.get(*key) {
                query.push((key, value.clone()));
            }
        }

        let url = format!("{}/aircon/set_control_info", self.base_url);
        let res = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| LinkError::from_http("Daikin set_control_info", e))?;
        let text = res
            .text()
            .await
            .map_err(|e| LinkError::from_http("Daikin set_control_info", e))?;

        let result = parse_kv_response(&text);
        match result.get("ret").map(String::as_str) {
            Some("OK") => {}
            other => {
                return Err(LinkError::TransportFailure(format!(
                    "Daikin returned: {}",
                    other.unwrap_or("no response")
                )));
            }
        }

        let mut session = self.session.write().await;
        session.control = params;

        Ok(kv_to_value(result))
    }
}

#[async_trait]
impl AcAdapter for DaikinAdapter {
    async fn connect(&self) -> Result<Value> {
        let info = self.http_get("/common/basic_info").await.map_err(|e| {
            LinkError::TransportFailure(format!("Cannot connect to Daikin at {}: {}", self.host, e))
        })?;

        debug!("Connected to Daikin at {}", self.host);
        let mut session = self.session.write().await;
        session.device_info = info.clone();
        session.connected = true;
        Ok(kv_to_value(info))
    }

    async fn disconnect(&self) -> Result<()> {
        let mut session = self.session.write().await;
        session.connected = false;
        Ok(())
    }

    async fn get_status(&self) -> Result<AcStatus> {
        let (control, sensor) = tokio::try_join!(
            self.http_get("/aircon/get_control_info"),
            self.http_get("/aircon/get_sensor_info"),
        )?;

        {
            let mut session = self.session.write().await;
            session.control = control.clone();
        }

        Ok(normalize_status(&control, &sensor))
    }

    async fn set_power(&self, on: bool) -> Result<Value> {
        self.set_control(&[("pow", if on { "1" } else { "0" }.to_string())])
            .await
    }

    async fn set_temperature(&self, temp: f64) -> Result<Value> {
        self.capabilities().check_temperature(temp)?;
        self.set_control(&[("stemp", temp.to_string())]).await
    }

    async fn set_mode(&self, mode: AcMode) -> Result<Value> {
        self.capabilities().check_mode(mode)?;
        let code = mode_to_code(mode).ok_or_else(|| {
            LinkError::UnsupportedValue(format!("mode '{}' not supported", mode.as_str()))
        })?;
        self.set_control(&[("mode", code.to_string())]).await
    }

    async fn set_fan_speed(&self, speed: &str) -> Result<Value> {
        self.capabilities().check_fan_speed(speed)?;
        let rate = fan_to_code(speed).unwrap_or("A");
        self.set_control(&[("f_rate", rate.to_string())]).await
    }

    async fn set_swing(&self, swing: &str) -> Result<Value> {
        self.capabilities().check_swing(swing)?;
        let dir = swing_to_code(swing).unwrap_or(0);
        self.set_control(&[("f_dir", dir.to_string())]).await
    }

    async fn set_special_mode(&self, mode: &str) -> Result<Value> {
        // Accept the generic vocabulary aliases for Daikin's flag names
        match mode {
            "eco" | "econo" => self.set_control(&[("en_econo", "1".to_string())]).await,
            "turbo" | "powerful" => self.set_control(&[("en_powerful", "1".to_string())]).await,
            "off" => {
                self.set_control(&[
                    ("en_econo", "0".to_string()),
                    ("en_powerful", "0".to_string()),
                ])
                .await
            }
            other => Err(LinkError::UnsupportedValue(format!(
                "special mode '{}' not supported",
                other
            ))),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            power: true,
            temperature: TempRange { min: 16.0, max: 30.0 },
            modes: vec![AcMode::Cool, AcMode::Heat, AcMode::Auto, AcMode::Dry, AcMode::Fan],
            fan_speeds: ["auto", "quiet", "low", "medium-low", "medium", "medium-high", "high"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            swing_modes: ["off", "vertical", "horizontal", "both"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            special_modes: ["off", "econo", "powerful"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Parse Daikin's key=value response format.
///
/// Example: `ret=OK,pow=1,mode=3,stemp=24.0,shum=0,f_rate=A,f_dir=0`
fn parse_kv_response(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in text.split(',') {
        let mut parts = pair.splitn(2, '=');
        if let Some(key) = parts.next() {
            let key = key.trim();
            if !key.is_empty() {
                map.insert(key.to_string(), parts.next().unwrap_or("").to_string());
            }
        }
    }
    map
}

fn kv_to_value(map: HashMap<String, String>) -> Value {
    Value::Object(
        map.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

fn normalize_status(
    control: &HashMap<String, String>,
    sensor: &HashMap<String, String>,
) -> AcStatus {
    let parse_f64 = |map: &HashMap<String, String>, key: &str| {
        map.get(key).and_then(|v| v.parse::<f64>().ok())
    };

    let power = match control.get("pow").map(String::as_str) {
        Some("1") => Power::On,
        _ => Power::Off,
    };

    let mode = control
        .get("mode")
        .and_then(|v| v.parse::<u8>().ok())
        .and_then(mode_from_code)
        .unwrap_or(AcMode::Cool);

    let fan_speed = control
        .get("f_rate")
        .and_then(|v| fan_from_code(v))
        .unwrap_or("auto")
        .to_string();

    let swing = control
        .get("f_dir")
        .and_then(|v| v.parse::<u8>().ok())
        .and_then(swing_from_code)
        .unwrap_or("off")
        .to_string();

    let special_mode = if control.get("en_econo").map(String::as_str) == Some("1") {
        "econo"
    } else if control.get("en_powerful").map(String::as_str) == Some("1") {
        "powerful"
    } else {
        "off"
    }
    .to_string();

    AcStatus {
        power,
        temperature: Temperatures {
            current: parse_f64(sensor, "htemp"),
            target: parse_f64(control, "stemp"),
            outdoor: parse_f64(sensor, "otemp"),
        },
        humidity: sensor.get("hhum").and_then(|v| v.parse::<u8>().ok()),
        mode,
        fan_speed,
        swing,
        special_mode,
        note: None,
    }
}

fn mode_from_code(code: u8) -> Option<AcMode> {
    match code {
        0 | 1 => Some(AcMode::Auto),
        2 => Some(AcMode::Dry),
        3 => Some(AcMode::Cool),
        4 => Some(AcMode::Heat),
        6 => Some(AcMode::Fan),
        _ => None,
    }
}

fn mode_to_code(mode: AcMode) -> Option<u8> {
    match mode {
        AcMode::Auto => Some(1),
        AcMode::Dry => Some(2),
        AcMode::Cool => Some(3),
        AcMode::Heat => Some(4),
        AcMode::Fan => Some(6),
        AcMode::Wind => None,
    }
}

fn fan_from_code(code: &str) -> Option<&'static str> {
    match code {
        "A" => Some("auto"),
        "B" => Some("quiet"),
        "3" => Some("low"),
        "4" => Some("medium-low"),
        "5" => Some("medium"),
        "6" => Some("medium-high"),
        "7" => Some("high"),
        _ => None,
    }
}

fn fan_to_code(speed: &str) -> Option<&'static str> {
    match speed {
        "auto" => Some("A"),
        "quiet" => Some("B"),
        "low" => Some("3"),
        "medium-low" => Some("4"),
        "medium" => Some("5"),
        "medium-high" => Some("6"),
        "high" => Some("7"),
        _ => None,
    }
}

fn swing_from_code(code: u8) -> Option<&'static str> {
    match code {
        0 => Some("off"),
        1 => Some("vertical"),
        2 => Some("horizontal"),
        3 => Some("both"),
        _ => None,
    }
}

fn swing_to_code(swing: &str) -> Option<u8> {
    match swing {
        "off" => Some(0),
        "vertical" => Some(1),
        "horizontal" => Some(2),
        "both" | "all" => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kv_response() {
        let map = parse_kv_response("ret=OK,pow=1,mode=3,stemp=24.0,f_rate=A,f_dir=0");
        assert_eq!(map.get("ret").map(String::as_str), Some("OK"));
        assert_eq!(map.get("pow").map(String::as_str), Some("1"));
        assert_eq!(map.get("stemp").map(String::as_str), Some("24.0"));
    }

    #[test]
    fn test_parse_kv_response_value_with_equals() {
        let map = parse_kv_response("name=ac=living,ret=OK");
        assert_eq!(map.get("name").map(String::as_str), Some("ac=living"));
    }

    #[test]
    fn test_normalize_status() {
        let control = parse_kv_response("ret=OK,pow=1,mode=3,stemp=24.0,f_rate=5,f_dir=3");
        let sensor = parse_kv_response("ret=OK,htemp=26.5,otemp=33.0,hhum=48");
        let status = normalize_status(&control, &sensor);

        assert_eq!(status.power, Power::On);
        assert_eq!(status.mode, AcMode::Cool);
        assert_eq!(status.temperature.current, Some(26.5));
        assert_eq!(status.temperature.target, Some(24.0));
        assert_eq!(status.temperature.outdoor, Some(33.0));
        assert_eq!(status.humidity, Some(48));
        assert_eq!(status.fan_speed, "medium");
        assert_eq!(status.swing, "both");
        assert_eq!(status.special_mode, "off");
    }

    #[test]
    fn test_normalize_status_defaults() {
        let status = normalize_status(&HashMap::new(), &HashMap::new());
        assert_eq!(status.power, Power::Off);
        assert_eq!(status.mode, AcMode::Cool);
        assert_eq!(status.fan_speed, "auto");
        assert_eq!(status.swing, "off");
        assert_eq!(status.temperature.current, None);
    }

    #[test]
    fn test_special_mode_flags() {
        let control = parse_kv_response("pow=1,mode=3,en_powerful=1");
        let status = normalize_status(&control, &HashMap::new());
        assert_eq!(status.special_mode, "powerful");

        let control = parse_kv_response("pow=1,mode=3,en_econo=1");
        let status = normalize_status(&control, &HashMap::new());
        assert_eq!(status.special_mode, "econo");
    }

    #[test]
    fn test_mode_mapping_round_trip() {
        for mode in [AcMode::Auto, AcMode::Dry, AcMode::Cool, AcMode::Heat, AcMode::Fan] {
            let code = mode_to_code(mode).unwrap();
            assert_eq!(mode_from_code(code), Some(mode));
        }
        assert_eq!(mode_to_code(AcMode::Wind), None);
        // Codes 0 and 1 both report auto
        assert_eq!(mode_from_code(0), Some(AcMode::Auto));
    }

    #[test]
    fn test_fan_and_swing_mapping() {
        assert_eq!(fan_to_code("quiet"), Some("B"));
        assert_eq!(fan_from_code("7"), Some("high"));
        assert_eq!(swing_to_code("all"), Some(3));
        assert_eq!(swing_from_code(2), Some("horizontal"));
    }

    #[tokio::test]
    async fn test_temperature_validation() {
        let adapter =
            DaikinAdapter::new("192.0.2.1", 80, Duration::from_millis(10)).unwrap();
        let err = adapter.set_temperature(45.0).await.unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedValue(_)));
    }
}
