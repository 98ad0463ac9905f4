/*!
 * Samsung local protocol adapter.
 *
 * Samsung smart ACs expose a REST API on port 8888 for local control,
 * including WindFree and the other Samsung-specific special modes.
 * Requires a one-time token pairing; the token travels as a bearer
 * header on every request afterwards.
 */
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};

use smartac_core::types::Value;

use crate::adapter::AcAdapter;
use crate::error::{LinkError, Result};
use crate::vocab::{AcMode, AcStatus, Capabilities, Power, TempRange, Temperatures};

/// Samsung local HTTP adapter
pub struct SamsungAdapter {
    host: String,
    base_url: String,
    client: reqwest::Client,
    session: RwLock<Session>,
}

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,
    last_status: Option<serde_json::Value>,
    connected: bool,
}

impl fmt::Debug for SamsungAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamsungAdapter")
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SamsungAdapter {
    /// Create a new adapter for a unit at `host:port`
    pub fn new(host: &str, port: u16, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LinkError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.to_string(),
            base_url: format!("http://{}:{}", host, port),
            client,
            session: RwLock::new(Session {
                token,
                ..Session::default()
            }),
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);

        let token = {
            let session = self.session.read().await;
            session.token.clone()
        };
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let res = req
            .send()
            .await
            .map_err(|e| LinkError::from_http(&format!("Samsung {}", path), e))?;
        let text = res
            .text()
            .await
            .map_err(|e| LinkError::from_http(&format!("Samsung {}", path), e))?;

        // Non-JSON bodies are wrapped rather than rejected
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text })))
    }

    async fn send_desired(&self, desired: serde_json::Value) -> Result<Value> {
        let res = self
            .request(Method::PUT, "/devices/0", Some(json!({ "desired": desired })))
            .await?;
        Ok(Value::from(res))
    }

    /// The raw status payload from the most recent read, for debugging
    /// brand-specific fields the normalized form drops
    pub async fn last_raw_status(&self) -> Option<serde_json::Value> {
        let session = self.session.read().await;
        session.last_status.clone()
    }

    /// One-time token pairing flow.
    ///
    /// The unit blinks or shows a code on its display while pairing is
    /// pending; the returned token is stored on the session and used for
    /// all subsequent requests.
    pub async fn pair(&self) -> Result<String> {
        let res = self
            .request(Method::POST, "/devices/0/pair", Some(json!({})))
            .await?;

        let token = res
            .get("token")
            .or_else(|| res.get("accessToken"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                LinkError::TransportFailure("Samsung pairing returned no token".to_string())
            })?;

        info!("Paired with Samsung AC at {}", self.host);
        let mut session = self.session.write().await;
        session.token = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl AcAdapter for SamsungAdapter {
    async fn connect(&self) -> Result<Value> {
        let res = self
            .request(Method::GET, "/devices/0", None)
            .await
            .map_err(|e| {
                LinkError::TransportFailure(format!(
                    "Cannot connect to Samsung AC at {}: {}",
                    self.host, e
                ))
            })?;

        debug!("Connected to Samsung AC at {}", self.host);
        let mut session = self.session.write().await;
        session.connected = true;
        Ok(Value::from(res))
    }

    async fn disconnect(&self) -> Result<()> {
        let mut session = self.session.write().await;
        session.connected = false;
        Ok(())
    }

    async fn get_status(&self) -> Result<AcStatus> {
        let raw = self.request(Method::GET, "/devices/0/status", None).await?;
        let status = normalize_status(&raw);

        let mut session = self.session.write().await;
        session.last_status = Some(raw);
        Ok(status)
    }

    async fn set_power(&self, on: bool) -> Result<Value> {
        self.send_desired(json!({ "switch": if on { "on" } else { "off" } }))
            .await
    }

    async fn set_temperature(&self, temp: f64) -> Result<Value> {
        self.capabilities().check_temperature(temp)?;
        self.send_desired(json!({ "desiredTemperature": temp })).await
    }

    async fn set_mode(&self, mode: AcMode) -> Result<Value> {
        self.capabilities().check_mode(mode)?;
        self.send_desired(json!({ "mode": mode.as_str() })).await
    }

    async fn set_fan_speed(&self, speed: &str) -> Result<Value> {
        self.capabilities().check_fan_speed(speed)?;
        self.send_desired(json!({ "fanMode": speed })).await
    }

    async fn set_swing(&self, swing: &str) -> Result<Value> {
        self.capabilities().check_swing(swing)?;
        self.send_desired(json!({ "fanOscillationMode": swing })).await
    }

    async fn set_special_mode(&self, mode: &str) -> Result<Value> {
        self.capabilities().check_special_mode(mode)?;
        self.send_desired(json!({ "optionalMode": mode })).await
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            power: true,
            temperature: TempRange { min: 16.0, max: 30.0 },
            modes: vec![AcMode::Cool, AcMode::Heat, AcMode::Auto, AcMode::Dry, AcMode::Wind],
            fan_speeds: ["auto", "low", "medium", "high", "turbo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            swing_modes: ["off", "fixed", "vertical", "horizontal", "all"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            special_modes: ["off", "quiet", "sleep", "windFree", "windFreeSleep", "speed"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Normalize the Samsung local API's nested status shape.
fn normalize_status(raw: &serde_json::Value) -> AcStatus {
    let status = raw
        .get("status")
        .or_else(|| raw.get("desired"))
        .unwrap_or(raw);

    let get_str = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| status.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
    };
    let get_f64 = |keys: &[&str]| -> Option<f64> {
        keys.iter().find_map(|k| status.get(*k).and_then(|v| v.as_f64()))
    };

    let power = match get_str(&["switch", "power"]).as_deref() {
        Some("on") => Power::On,
        Some("off") => Power::Off,
        _ => Power::Off,
    };

    let mode = get_str(&["mode"])
        .and_then(|s| AcMode::parse(&s))
        .unwrap_or(AcMode::Cool);

    AcStatus {
        power,
        temperature: Temperatures {
            current: get_f64(&["temperature", "currentTemperature"]),
            target: get_f64(&["desiredTemperature", "targetTemperature"]),
            outdoor: None,
        },
        humidity: get_f64(&["humidity"]).map(|h| h as u8),
        mode,
        fan_speed: get_str(&["fanMode", "fanSpeed"]).unwrap_or_else(|| "auto".to_string()),
        swing: get_str(&["fanOscillationMode"]).unwrap_or_else(|| "off".to_string()),
        special_mode: get_str(&["optionalMode", "specialMode"])
            .unwrap_or_else(|| "off".to_string()),
        note: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_nested_status() {
        let raw = json!({
            "status": {
                "switch": "on",
                "temperature": 26.0,
                "desiredTemperature": 23.0,
                "humidity": 55,
                "mode": "cool",
                "fanMode": "turbo",
                "fanOscillationMode": "all",
                "optionalMode": "windFree"
            }
        });
        let status = normalize_status(&raw);
        assert_eq!(status.power, Power::On);
        assert_eq!(status.temperature.current, Some(26.0));
        assert_eq!(status.temperature.target, Some(23.0));
        assert_eq!(status.humidity, Some(55));
        assert_eq!(status.mode, AcMode::Cool);
        assert_eq!(status.fan_speed, "turbo");
        assert_eq!(status.swing, "all");
        assert_eq!(status.special_mode, "windFree");
    }

    #[test]
    fn test_normalize_flat_status_with_fallback_keys() {
        let raw = json!({
            "power": "on",
            "currentTemperature": 27.5,
            "targetTemperature": 24.0,
            "fanSpeed": "low",
            "specialMode": "sleep"
        });
        let status = normalize_status(&raw);
        assert_eq!(status.power, Power::On);
        assert_eq!(status.temperature.current, Some(27.5));
        assert_eq!(status.temperature.target, Some(24.0));
        assert_eq!(status.fan_speed, "low");
        assert_eq!(status.special_mode, "sleep");
    }

    #[test]
    fn test_normalize_empty_status_defaults() {
        let status = normalize_status(&json!({}));
        assert_eq!(status.power, Power::Off);
        assert_eq!(status.mode, AcMode::Cool);
        assert_eq!(status.fan_speed, "auto");
        assert_eq!(status.swing, "off");
        assert_eq!(status.special_mode, "off");
    }

    #[tokio::test]
    async fn test_value_validation() {
        let adapter = SamsungAdapter::new(
            "192.0.2.2",
            8888,
            None,
            Duration::from_millis(10),
        )
        .unwrap();

        // Samsung has no "fan" mode; the set is validated before any I/O
        let err = adapter.set_mode(AcMode::Fan).await.unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedValue(_)));

        let err = adapter.set_special_mode("disco").await.unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedValue(_)));
    }
}
