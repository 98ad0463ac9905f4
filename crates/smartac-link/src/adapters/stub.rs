/*!
 * Placeholder adapters for brands whose local protocols are not wired up.
 *
 * Midea and Gree use proprietary encrypted binary protocols. Their
 * capability sets are declared so discovery and registration still work,
 * but every operation returns a structured not-implemented error so the
 * registry can fall back to cloud control.
 */
use async_trait::async_trait;

use smartac_core::types::Value;

use crate::adapter::AcAdapter;
use crate::adapters::Brand;
use crate::error::{LinkError, Result};
use crate::vocab::{AcMode, AcStatus, Capabilities, TempRange};

/// Adapter stub for brands with a known but unimplemented local protocol
#[derive(Debug)]
pub struct StubAdapter {
    brand: Brand,
    host: String,
    port: Option<u16>,
}

impl StubAdapter {
    /// Create a stub for a brand at a host
    pub fn new(brand: Brand, host: &str, port: Option<u16>) -> Self {
        Self {
            brand,
            host: host.to_string(),
            port,
        }
    }

    /// The well-known local port for this brand's protocol
    pub fn default_port(&self) -> u16 {
        match self.brand {
            Brand::Midea => 6444,
            Brand::Gree => 7000,
            Brand::Daikin => 80,
            Brand::Samsung => 8888,
        }
    }

    fn not_implemented(&self, operation: &str) -> LinkError {
        LinkError::NotImplemented {
            brand: self.brand.as_str().to_string(),
            operation: operation.to_string(),
        }
    }
}

#[async_trait]
impl AcAdapter for StubAdapter {
    async fn connect(&self) -> Result<Value> {
        tracing::debug!(
            "No local protocol for {} at {}:{}",
            self.brand.as_str(),
            self.host,
            self.port.unwrap_or_else(|| self.default_port())
        );
        Err(self.not_implemented("connect"))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn get_status(&self) -> Result<AcStatus> {
        Err(self.not_implemented("get_status"))
    }

    async fn set_power(&self, _on: bool) -> Result<Value> {
        Err(self.not_implemented("set_power"))
    }

    async fn set_temperature(&self, _temp: f64) -> Result<Value> {
        Err(self.not_implemented("set_temperature"))
    }

    async fn set_mode(&self, _mode: AcMode) -> Result<Value> {
        Err(self.not_implemented("set_mode"))
    }

    async fn set_fan_speed(&self, _speed: &str) -> Result<Value> {
        Err(self.not_implemented("set_fan_speed"))
    }

    async fn set_swing(&self, _swing: &str) -> Result<Value> {
        Err(self.not_implemented("set_swing"))
    }

    async fn set_special_mode(&self, _mode: &str) -> Result<Value> {
        Err(self.not_implemented("set_special_mode"))
    }

    fn capabilities(&self) -> Capabilities {
        match self.brand {
            Brand::Gree => Capabilities {
                power: true,
                temperature: TempRange { min: 16.0, max: 30.0 },
                modes: vec![AcMode::Cool, AcMode::Heat, AcMode::Auto, AcMode::Dry, AcMode::Fan],
                fan_speeds: ["auto", "low", "mediumLow", "medium", "mediumHigh", "high"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                swing_modes: ["off", "full", "fixed"].iter().map(|s| s.to_string()).collect(),
                special_modes: ["off", "sleep", "turbo", "quiet"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            _ => Capabilities {
                power: true,
                temperature: TempRange { min: 17.0, max: 30.0 },
                modes: vec![AcMode::Cool, AcMode::Heat, AcMode::Auto, AcMode::Dry, AcMode::Fan],
                fan_speeds: ["auto", "low", "medium", "high"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                swing_modes: ["off", "vertical", "horizontal", "both"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                special_modes: ["off", "eco", "turbo", "sleep"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_return_not_implemented() {
        let adapter = StubAdapter::new(Brand::Midea, "192.168.1.60", None);

        let err = adapter.connect().await.unwrap_err();
        match err {
            LinkError::NotImplemented { brand, operation } => {
                assert_eq!(brand, "midea");
                assert_eq!(operation, "connect");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = adapter.set_power(true).await.unwrap_err();
        assert!(matches!(err, LinkError::NotImplemented { .. }));

        // Disconnect never fails so teardown paths stay clean
        assert!(adapter.disconnect().await.is_ok());
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(StubAdapter::new(Brand::Midea, "h", None).default_port(), 6444);
        assert_eq!(StubAdapter::new(Brand::Gree, "h", None).default_port(), 7000);
    }

    #[test]
    fn test_capabilities_per_brand() {
        let gree = StubAdapter::new(Brand::Gree, "h", None);
        assert!(gree.capabilities().fan_speeds.contains(&"mediumLow".to_string()));

        let midea = StubAdapter::new(Brand::Midea, "h", None);
        assert_eq!(midea.capabilities().temperature.min, 17.0);
    }
}
