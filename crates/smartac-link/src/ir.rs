/*!
 * IR blaster gateway glue.
 *
 * IR control is one-way: commands map to pre-learned code keys and
 * nothing ever comes back from the unit, so status reads over IR return
 * a placeholder. The controller itself (network blaster, GPIO emitter)
 * is injected at registry construction.
 */
use std::fmt::Debug;

use async_trait::async_trait;

use smartac_core::types::Value;

use crate::error::Result;
use crate::vocab::Command;

/// An IR blaster capable of emitting pre-learned codes.
///
/// `blaster_id` selects which physical blaster to use; `brand` selects
/// the code table. Implementations resolve the command to a code via
/// [`ir_command_key`] or their own lookup.
#[async_trait]
pub trait IrController: Send + Sync + Debug {
    /// Emit the IR code for a command
    async fn send(&self, blaster_id: &str, brand: &str, command: &Command) -> Result<Value>;
}

/// Map a command to the key of a pre-learned IR code.
///
/// Temperature over IR is relative (up/down steps) since the blaster has
/// no idea what the unit currently shows.
pub fn ir_command_key(command: &Command) -> String {
    match command {
        Command::Power(true) => "power_on".to_string(),
        Command::Power(false) => "power_off".to_string(),
        Command::Temperature(_) => "temp_up".to_string(),
        Command::Mode(mode) => format!("mode_{}", mode.as_str()),
        Command::FanSpeed(speed) => format!("fan_{}", speed),
        Command::Swing(swing) => {
            if swing == "off" {
                "swing_off".to_string()
            } else {
                "swing_on".to_string()
            }
        }
        Command::SpecialMode(mode) => format!("mode_{}", mode),
    }
}
