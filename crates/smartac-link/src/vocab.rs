/*!
 * Normalized status and command vocabulary.
 *
 * Every brand adapter translates its wire format into these types, so
 * callers see one contract regardless of how a unit is reached.
 */
use serde::{Deserialize, Serialize};

use smartac_core::types::Value;

use crate::error::{LinkError, Result};

/// Power state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    /// The unit is on
    On,
    /// The unit is off
    Off,
    /// The state cannot be read (infrared and stub transports)
    Unknown,
}

/// Operating mode of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    /// Cooling (the default when a brand reports an unknown mode)
    Cool,
    /// Heating
    Heat,
    /// Automatic heating/cooling
    Auto,
    /// Dehumidify
    Dry,
    /// Fan only
    Fan,
    /// Samsung "wind" mode
    Wind,
}

impl AcMode {
    /// Convert to the wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            AcMode::Cool => "cool",
            AcMode::Heat => "heat",
            AcMode::Auto => "auto",
            AcMode::Dry => "dry",
            AcMode::Fan => "fan",
            AcMode::Wind => "wind",
        }
    }

    /// Parse from a wire string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cool" => Some(AcMode::Cool),
            "heat" => Some(AcMode::Heat),
            "auto" => Some(AcMode::Auto),
            "dry" => Some(AcMode::Dry),
            "fan" => Some(AcMode::Fan),
            "wind" => Some(AcMode::Wind),
            _ => None,
        }
    }
}

/// Temperature readings in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Temperatures {
    /// Current room temperature
    pub current: Option<f64>,
    /// Target temperature
    pub target: Option<f64>,
    /// Outdoor temperature, where the brand reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdoor: Option<f64>,
}

/// Normalized device status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcStatus {
    /// Power state
    pub power: Power,
    /// Temperature readings
    pub temperature: Temperatures,
    /// Relative humidity percentage
    pub humidity: Option<u8>,
    /// Operating mode
    pub mode: AcMode,
    /// Fan speed (brand-enumerated, e.g. "auto", "low", "high")
    pub fan_speed: String,
    /// Swing/oscillation mode (e.g. "off", "vertical", "both")
    pub swing: String,
    /// Special mode (e.g. "off", "eco", "turbo", "windFree")
    pub special_mode: String,
    /// Free-text annotation, used by send-only transports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Default for AcStatus {
    fn default() -> Self {
        Self {
            power: Power::Off,
            temperature: Temperatures::default(),
            humidity: None,
            mode: AcMode::Cool,
            fan_speed: "auto".to_string(),
            swing: "off".to_string(),
            special_mode: "off".to_string(),
            note: None,
        }
    }
}

impl AcStatus {
    /// The fixed placeholder returned for send-only infrared devices
    pub fn ir_unavailable() -> Self {
        Self {
            power: Power::Unknown,
            note: Some("IR connection - status not available".to_string()),
            ..Self::default()
        }
    }
}

/// Supported temperature range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempRange {
    /// Minimum settable temperature
    pub min: f64,
    /// Maximum settable temperature
    pub max: f64,
}

impl TempRange {
    /// Whether a target temperature falls inside the range
    pub fn contains(&self, temp: f64) -> bool {
        temp >= self.min && temp <= self.max
    }
}

/// Static capability description for a device
///
/// Consumed by downstream preset generation; also used by adapters to
/// validate command values before sending them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Whether power control is supported
    pub power: bool,
    /// Settable temperature range, degrees Celsius
    pub temperature: TempRange,
    /// Supported operating modes
    pub modes: Vec<AcMode>,
    /// Supported fan speeds
    pub fan_speeds: Vec<String>,
    /// Supported swing modes
    pub swing_modes: Vec<String>,
    /// Supported special modes
    pub special_modes: Vec<String>,
}

impl Capabilities {
    /// Validate a mode against the declared set
    pub fn check_mode(&self, mode: AcMode) -> Result<()> {
        if self.modes.contains(&mode) {
            Ok(())
        } else {
            Err(LinkError::UnsupportedValue(format!(
                "mode '{}' not supported",
                mode.as_str()
            )))
        }
    }

    /// Validate a target temperature against the declared range
    pub fn check_temperature(&self, temp: f64) -> Result<()> {
        if self.temperature.contains(temp) {
            Ok(())
        } else {
            Err(LinkError::UnsupportedValue(format!(
                "temperature {} outside supported range {}..{}",
                temp, self.temperature.min, self.temperature.max
            )))
        }
    }

    /// Validate a fan speed against the declared set
    pub fn check_fan_speed(&self, speed: &str) -> Result<()> {
        check_enumerated("fan speed", speed, &self.fan_speeds)
    }

    /// Validate a swing mode against the declared set
    pub fn check_swing(&self, swing: &str) -> Result<()> {
        check_enumerated("swing mode", swing, &self.swing_modes)
    }

    /// Validate a special mode against the declared set
    pub fn check_special_mode(&self, mode: &str) -> Result<()> {
        check_enumerated("special mode", mode, &self.special_modes)
    }
}

fn check_enumerated(what: &str, value: &str, allowed: &[String]) -> Result<()> {
    if allowed.iter().any(|v| v == value) {
        Ok(())
    } else {
        Err(LinkError::UnsupportedValue(format!(
            "{} '{}' not supported",
            what, value
        )))
    }
}

/// A parsed, brand-independent command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Turn the unit on or off
    Power(bool),
    /// Set the target temperature, degrees Celsius
    Temperature(f64),
    /// Set the operating mode
    Mode(AcMode),
    /// Set the fan speed
    FanSpeed(String),
    /// Set the swing mode
    Swing(String),
    /// Set the special mode
    SpecialMode(String),
}

impl Command {
    /// Parse a generic `(name, value)` pair into a command.
    ///
    /// Accepts both short and verbose command names (`"power"` and
    /// `"setPower"`); unrecognized names fail with
    /// [`LinkError::UnknownCommand`] and malformed values with
    /// [`LinkError::UnsupportedValue`].
    pub fn parse(name: &str, value: &Value) -> Result<Self> {
        match name {
            "power" | "setPower" => Ok(Command::Power(parse_power_value(value)?)),
            "temperature" | "setTemperature" => {
                let temp = value.as_float().ok_or_else(|| {
                    LinkError::UnsupportedValue(format!("temperature must be numeric: {:?}", value))
                })?;
                Ok(Command::Temperature(temp))
            }
            "mode" | "setMode" => {
                let s = expect_string(value, "mode")?;
                let mode = AcMode::parse(s).ok_or_else(|| {
                    LinkError::UnsupportedValue(format!("unknown mode: {}", s))
                })?;
                Ok(Command::Mode(mode))
            }
            "fanSpeed" | "setFanSpeed" => {
                Ok(Command::FanSpeed(expect_string(value, "fanSpeed")?.to_string()))
            }
            "swing" | "setSwing" => {
                Ok(Command::Swing(expect_string(value, "swing")?.to_string()))
            }
            "specialMode" | "setSpecialMode" => Ok(Command::SpecialMode(
                expect_string(value, "specialMode")?.to_string(),
            )),
            other => Err(LinkError::UnknownCommand(other.to_string())),
        }
    }

    /// The canonical (short) command name
    pub fn name(&self) -> &'static str {
        match self {
            Command::Power(_) => "power",
            Command::Temperature(_) => "temperature",
            Command::Mode(_) => "mode",
            Command::FanSpeed(_) => "fanSpeed",
            Command::Swing(_) => "swing",
            Command::SpecialMode(_) => "specialMode",
        }
    }

    /// The command value as a dynamic [`Value`]
    pub fn value(&self) -> Value {
        match self {
            Command::Power(on) => Value::Bool(*on),
            Command::Temperature(t) => Value::Float(*t),
            Command::Mode(m) => Value::String(m.as_str().to_string()),
            Command::FanSpeed(s) => Value::String(s.clone()),
            Command::Swing(s) => Value::String(s.clone()),
            Command::SpecialMode(s) => Value::String(s.clone()),
        }
    }
}

fn parse_power_value(value: &Value) -> Result<bool> {
    if let Some(b) = value.as_bool() {
        return Ok(b);
    }
    match value.as_str() {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(LinkError::UnsupportedValue(format!(
            "power must be a boolean or \"on\"/\"off\": {:?}",
            value
        ))),
    }
}

fn expect_string<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        LinkError::UnsupportedValue(format!("{} must be a string: {:?}", what, value))
    })
}
