/*!
 * Prelude module for SmartAC Core.
 *
 * This module re-exports commonly used types and functions from the
 * SmartAC Core crate to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export core types
pub use crate::types::{Id, Metadata, Value};

// Re-export config types
pub use crate::config::{Config, LinkConfig, SharedConfig};

// Re-export utility functions
pub use crate::utils::{millis_to_duration, spawn_and_log, with_timeout};

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
