/*!
 * Error types for the SmartAC connectivity layer.
 */
use thiserror::Error;

/// Error type for transport, adapter and discovery operations
#[derive(Error, Debug)]
pub enum LinkError {
    /// Operation requested for an unknown device identifier
    #[error("Device {0} not registered")]
    NotRegistered(String),

    /// The selected transport cannot be used for this device
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// No local protocol adapter exists for the device's brand
    #[error("No local protocol adapter for brand: {0}")]
    UnsupportedBrand(String),

    /// A required injected collaborator was not supplied
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(String),

    /// The selected transport is not usable for this attempt
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// A specific transport attempt failed
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Both the primary transport and the cloud fallback failed
    #[error("All transports failed for {device}: local: {primary}, cloud: {fallback}")]
    AllTransportsFailed {
        /// The device identifier
        device: String,
        /// The primary transport's error message
        primary: String,
        /// The fallback transport's error message
        fallback: String,
    },

    /// A command value is outside the adapter's declared capability set
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// A generic command name was not recognized
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The brand's adapter is a deliberate stub
    #[error("{brand} protocol: {operation} not implemented")]
    NotImplemented {
        /// The brand key
        brand: String,
        /// The operation that was attempted
        operation: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] smartac_core::error::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl LinkError {
    /// Create a transport failure from an HTTP error
    pub fn from_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LinkError::TransportFailure(format!("{}: request timed out", context))
        } else {
            LinkError::TransportFailure(format!("{}: {}", context, err))
        }
    }
}

/// Result type for connectivity-layer operations
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_error_names_both_failures() {
        let e = LinkError::AllTransportsFailed {
            device: "d1".to_string(),
            primary: "connection refused".to_string(),
            fallback: "401 unauthorized".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("d1"));
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("401 unauthorized"));
    }

    #[test]
    fn test_not_implemented_is_distinct() {
        let e = LinkError::NotImplemented {
            brand: "midea".to_string(),
            operation: "connect".to_string(),
        };
        assert!(matches!(e, LinkError::NotImplemented { .. }));
        assert!(e.to_string().contains("midea"));
    }
}
