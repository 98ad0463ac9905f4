/*!
 * Logging functionality for SmartAC.
 *
 * This module provides tracing setup and utilities for consistent logging
 * across the SmartAC crates.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "smartac=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for a device operation
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `device_id` - The device the operation targets
pub fn device_span(name: &str, device_id: &str) -> Span {
    tracing::info_span!("device_op", name = %name, device = %device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        // Fails on repeated initialization in the same process, which is fine
        let _ = init();
    }

    #[test]
    fn test_device_span() {
        let span = device_span("get_status", "living-room-ac");
        let _guard = span.enter();
    }
}
