/*!
 * SmartAC Link
 *
 * This crate provides the device connectivity layer for SmartAC:
 * brand protocol adapters, the transport registry with health tracking
 * and local-to-cloud failover, and local network discovery.
 */

#![warn(missing_docs)]

// Re-export core types
pub use smartac_core::prelude;

pub mod adapter;
pub mod adapters;
pub mod cloud;
pub mod discovery;
pub mod error;
pub mod ir;
pub mod registry;
pub mod vocab;

// Re-export the surface most callers need
pub use adapter::AcAdapter;
pub use cloud::CloudStrategy;
pub use discovery::DiscoveryEngine;
pub use error::{LinkError, Result};
pub use ir::IrController;
pub use registry::{DeviceConfig, TransportKind, TransportRegistry};
pub use vocab::{AcMode, AcStatus, Capabilities, Command, Power};

/// SmartAC link crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<()> {
    tracing::info!("SmartAC Link {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
