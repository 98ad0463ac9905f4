/*!
 * Protocol adapter interface.
 *
 * Every brand-specific adapter implements this trait against the brand's
 * local wire format. Adapters confine side effects to their own session
 * and cache state; they never touch registry state.
 */
use std::fmt::Debug;

use async_trait::async_trait;

use smartac_core::types::Value;

use crate::error::Result;
use crate::vocab::{AcStatus, Capabilities, Command};

/// The protocol adapter contract.
///
/// All operations may fail with a transport error. `connect` is
/// idempotent and must succeed before other operations are meaningful.
#[async_trait]
pub trait AcAdapter: Send + Sync + Debug {
    /// Establish reachability to the device
    async fn connect(&self) -> Result<Value>;

    /// Release any held resources; always succeeds
    async fn disconnect(&self) -> Result<()>;

    /// Read the normalized device status
    async fn get_status(&self) -> Result<AcStatus>;

    /// Set power on/off
    async fn set_power(&self, on: bool) -> Result<Value>;

    /// Set the target temperature, degrees Celsius
    async fn set_temperature(&self, temp: f64) -> Result<Value>;

    /// Set the operating mode
    async fn set_mode(&self, mode: crate::vocab::AcMode) -> Result<Value>;

    /// Set the fan speed
    async fn set_fan_speed(&self, speed: &str) -> Result<Value>;

    /// Set the swing/oscillation mode
    async fn set_swing(&self, swing: &str) -> Result<Value>;

    /// Set the special/optional mode (eco, turbo, sleep, ...)
    async fn set_special_mode(&self, mode: &str) -> Result<Value>;

    /// Static description of what the device supports
    fn capabilities(&self) -> Capabilities;

    /// Dispatch a parsed command to the matching setter
    async fn execute(&self, command: &Command) -> Result<Value> {
        match command {
            Command::Power(on) => self.set_power(*on).await,
            Command::Temperature(temp) => self.set_temperature(*temp).await,
            Command::Mode(mode) => self.set_mode(*mode).await,
            Command::FanSpeed(speed) => self.set_fan_speed(speed).await,
            Command::Swing(swing) => self.set_swing(swing).await,
            Command::SpecialMode(mode) => self.set_special_mode(mode).await,
        }
    }
}
