/*!
 * Brand-specific protocol adapter implementations.
 *
 * Maps brand keys to adapter implementations and provides the single
 * factory entry point used by the transport registry. Several brands are
 * OEM rebrands of the same wire protocol and share an adapter.
 */
use std::time::Duration;

use smartac_core::types::Metadata;

use crate::adapter::AcAdapter;
use crate::error::{LinkError, Result};

pub mod daikin;
pub mod samsung;
pub mod stub;

pub use daikin::DaikinAdapter;
pub use samsung::SamsungAdapter;
pub use stub::StubAdapter;

/// Default per-request timeout for local adapter HTTP calls
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(5);

/// The closed set of brand protocol families with a local adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Brand {
    /// Daikin local HTTP API (port 80)
    Daikin,
    /// Samsung local HTTP API (port 8888)
    Samsung,
    /// Midea binary TCP protocol (port 6444) - deliberate stub
    Midea,
    /// Gree encrypted UDP protocol (port 7000) - deliberate stub
    Gree,
}

impl Brand {
    /// Resolve a brand key to its protocol family, including OEM aliases
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "daikin" => Some(Brand::Daikin),
            "samsung" => Some(Brand::Samsung),
            // Carrier and Comfee are Midea OEMs; some Toshiba units too
            "midea" | "carrier" | "comfee" | "toshiba" => Some(Brand::Midea),
            // Hisense and Tosot ship the Gree protocol
            "gree" | "hisense" | "tosot" => Some(Brand::Gree),
            _ => None,
        }
    }

    /// The canonical brand key
    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Daikin => "daikin",
            Brand::Samsung => "samsung",
            Brand::Midea => "midea",
            Brand::Gree => "gree",
        }
    }
}

/// All brand keys with a local protocol adapter (including OEM aliases)
pub fn supported_brands() -> Vec<&'static str> {
    vec![
        "daikin", "samsung", "midea", "carrier", "comfee", "toshiba", "gree", "hisense", "tosot",
    ]
}

/// Check whether a brand key has a local protocol adapter
pub fn has_adapter(key: &str) -> bool {
    Brand::from_key(key).is_some()
}

/// Create a protocol adapter for a brand.
///
/// # Arguments
///
/// * `brand_key` - Brand key (e.g. "daikin", "samsung", or an OEM alias)
/// * `host` - Device network address
/// * `port` - Device port; defaults to the brand's well-known port
/// * `options` - Adapter-specific options (e.g. Samsung pairing token)
/// * `timeout` - Per-request timeout for the adapter's network calls
pub fn create_adapter(
    brand_key: &str,
    host: &str,
    port: Option<u16>,
    options: &Metadata,
    timeout: Duration,
) -> Result<Box<dyn AcAdapter>> {
    let brand = Brand::from_key(brand_key).ok_or_else(|| {
        LinkError::UnsupportedBrand(format!(
            "{} (supported: {})",
            brand_key,
            supported_brands().join(", ")
        ))
    })?;

    match brand {
        Brand::Daikin => Ok(Box::new(DaikinAdapter::new(
            host,
            port.unwrap_or(80),
            timeout,
        )?)),
        Brand::Samsung => {
            let token = options
                .get("token")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Ok(Box::new(SamsungAdapter::new(
                host,
                port.unwrap_or(8888),
                token,
                timeout,
            )?))
        }
        Brand::Midea | Brand::Gree => Ok(Box::new(StubAdapter::new(brand, host, port))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_aliases() {
        assert_eq!(Brand::from_key("Daikin"), Some(Brand::Daikin));
        assert_eq!(Brand::from_key("carrier"), Some(Brand::Midea));
        assert_eq!(Brand::from_key("comfee"), Some(Brand::Midea));
        assert_eq!(Brand::from_key("hisense"), Some(Brand::Gree));
        assert_eq!(Brand::from_key("tosot"), Some(Brand::Gree));
        assert_eq!(Brand::from_key("lg"), None);
    }

    #[test]
    fn test_has_adapter() {
        assert!(has_adapter("samsung"));
        assert!(has_adapter("TOSHIBA"));
        assert!(!has_adapter("voltas"));
    }

    #[test]
    fn test_create_adapter_unknown_brand() {
        let err = create_adapter(
            "voltas",
            "192.168.1.50",
            None,
            &Metadata::new(),
            DEFAULT_ADAPTER_TIMEOUT,
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedBrand(_)));
        assert!(err.to_string().contains("daikin"));
    }

    #[test]
    fn test_create_adapter_stub_brand() {
        let adapter = create_adapter(
            "hisense",
            "192.168.1.60",
            None,
            &Metadata::new(),
            DEFAULT_ADAPTER_TIMEOUT,
        )
        .unwrap();
        // Stub adapters still declare real capability sets
        assert!(adapter.capabilities().power);
    }
}
