/*!
 * Cloud control strategy.
 *
 * The registry never speaks to any vendor cloud directly. A deployment
 * injects a [`CloudStrategy`] at registry construction; without one,
 * cloud-preferred devices and local-to-cloud failover are unavailable.
 */
use std::fmt::Debug;

use async_trait::async_trait;

use smartac_core::types::Value;

use crate::error::Result;
use crate::vocab::{AcStatus, Command};

/// Vendor-cloud control surface, injected into the transport registry.
///
/// `cloud_id` is the device's identifier in the vendor cloud, which may
/// differ from its registry id. Implementations normalize cloud status
/// payloads into [`AcStatus`] themselves.
#[async_trait]
pub trait CloudStrategy: Send + Sync + Debug {
    /// Fetch the device status through the cloud
    async fn get_status(&self, cloud_id: &str) -> Result<AcStatus>;

    /// Send a control command through the cloud
    async fn send_command(&self, cloud_id: &str, command: &Command) -> Result<Value>;
}
