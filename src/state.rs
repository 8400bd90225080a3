//! Typed interpretation of raw device replies.
//!
//! Symbolic replies decode through exhaustive token matches; anything else is a
//! decode failure rather than a silently-accepted value.

use crate::error::{LaserError, LaserResult};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Two-valued device setting, `0` = off and `1` = on on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    /// Wire token `0`.
    Off,
    /// Wire token `1`.
    On,
}

impl Switch {
    /// Wire token for this value.
    pub fn token(self) -> &'static str {
        match self {
            Switch::Off => "0",
            Switch::On => "1",
        }
    }

    /// Logical view of the setting.
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

impl From<bool> for Switch {
    fn from(value: bool) -> Self {
        if value {
            Switch::On
        } else {
            Switch::Off
        }
    }
}

impl From<Switch> for bool {
    fn from(value: Switch) -> Self {
        value.is_on()
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Error for a token that is neither `0` nor `1`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected '0' or '1', got '{0}'")]
pub struct InvalidSwitch(pub String);

impl FromStr for Switch {
    type Err = InvalidSwitch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Switch::Off),
            "1" => Ok(Switch::On),
            _ => Err(InvalidSwitch(s.to_string())),
        }
    }
}

/// Named bits of the 16-bit fault code.
///
/// The discriminant is the bit position. Bit 0 flags active emission and is
/// not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCodeField {
    /// Diode current out of range.
    DiodeCurrent = 1,
    /// Optical power out of range.
    LaserPower = 2,
    /// Power supply fault.
    PowerSupply = 3,
    /// Diode temperature out of range.
    DiodeTemperature = 4,
    /// Base plate temperature out of range.
    BaseTemperature = 5,
    /// Interlock open.
    Interlock = 7,
}

impl FaultCodeField {
    /// All named fault flags, lowest bit first.
    pub const ALL: [FaultCodeField; 6] = [
        FaultCodeField::DiodeCurrent,
        FaultCodeField::LaserPower,
        FaultCodeField::PowerSupply,
        FaultCodeField::DiodeTemperature,
        FaultCodeField::BaseTemperature,
        FaultCodeField::Interlock,
    ];

    /// Bit position of this flag.
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// Flag assigned to bit `bit`, if any.
    pub fn from_bit(bit: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.bit() == bit)
    }
}

/// Decode a fault bitmask into its named flags.
///
/// Bits 1 through 15 are examined; bit 0 never contributes. Set bits without a
/// named flag are logged and skipped.
pub fn decode_faults(code: u16) -> Vec<FaultCodeField> {
    let mut faults = Vec::new();
    let mut remaining = code >> 1;
    let mut bit = 1;
    while remaining != 0 {
        if remaining & 1 == 1 {
            match FaultCodeField::from_bit(bit) {
                Some(field) => faults.push(field),
                None => tracing::debug!(bit, code, "Unassigned fault bit set"),
            }
        }
        remaining >>= 1;
        bit += 1;
    }
    faults
}

/// Parse a fault code reply.
pub fn parse_fault_code(mnemonic: &str, reply: &str) -> LaserResult<u16> {
    reply
        .trim()
        .parse::<u16>()
        .map_err(|e| LaserError::decode(mnemonic, reply, e.to_string()))
}

/// Coarse device state derived from the fault code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Warming up.
    Warmup = 0,
    /// Ready, not emitting.
    Standby = 2,
    /// Emitting.
    LaserEmissionActive = 3,
    /// Internal error.
    InternalError = 4,
    /// Any fault; see the fault list for details.
    Fault = 5,
    /// Sleep mode.
    Sleep = 6,
}

impl DeviceState {
    /// Map a status code to a state. Codes at or above `Fault` collapse to
    /// `Fault`; codes without a state yield `None`.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(DeviceState::Warmup),
            2 => Some(DeviceState::Standby),
            3 => Some(DeviceState::LaserEmissionActive),
            4 => Some(DeviceState::InternalError),
            c if c >= DeviceState::Fault as u16 => Some(DeviceState::Fault),
            _ => None,
        }
    }
}

/// USB port mode of an L6CC combiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsbConfiguration {
    /// Native USB device.
    StandardUsb,
    /// USB CDC virtual serial port.
    VirtualSerialPort,
}

impl UsbConfiguration {
    /// Wire token for this value.
    pub fn token(self) -> &'static str {
        match self {
            UsbConfiguration::StandardUsb => "0",
            UsbConfiguration::VirtualSerialPort => "1",
        }
    }

    /// Decode a wire token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(UsbConfiguration::StandardUsb),
            "1" => Some(UsbConfiguration::VirtualSerialPort),
            _ => None,
        }
    }
}

/// Decode a boolean reply to `mnemonic`.
pub fn parse_switch(mnemonic: &str, reply: &str) -> LaserResult<Switch> {
    reply
        .parse::<Switch>()
        .map_err(|e| LaserError::decode(mnemonic, reply, e.to_string()))
}

/// Decode a numeric reply to `mnemonic`.
pub fn parse_number(mnemonic: &str, reply: &str) -> LaserResult<f64> {
    reply
        .trim()
        .parse::<f64>()
        .map_err(|e| LaserError::decode(mnemonic, reply, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_round_trips_through_wire_tokens() {
        for sw in [Switch::Off, Switch::On] {
            assert_eq!(sw.token().parse::<Switch>(), Ok(sw));
        }
    }

    #[test]
    fn switch_rejects_anything_else() {
        for bad in ["", "2", "on", " 1", "1 ", "01", "true"] {
            assert!(bad.parse::<Switch>().is_err(), "accepted {bad:?}");
        }
        assert_eq!(
            "2".parse::<Switch>().unwrap_err().to_string(),
            "expected '0' or '1', got '2'"
        );
    }

    #[test]
    fn switch_decode_failure_is_typed() {
        let err = parse_switch("?DL", "yes").unwrap_err();
        assert!(matches!(err, LaserError::Decode { .. }));
    }

    #[test]
    fn switch_bool_views() {
        assert!(Switch::On.is_on());
        assert!(!bool::from(Switch::Off));
        assert_eq!(Switch::from(true), Switch::On);
    }

    #[test]
    fn bit_zero_never_reported() {
        for code in 0..=u16::MAX {
            let faults = decode_faults(code);
            assert!(faults.iter().all(|f| f.bit() != 0));
        }
        assert!(decode_faults(0b1).is_empty());
    }

    #[test]
    fn every_named_bit_is_reported() {
        // Bits 1-5 and 7 plus emission bit 0 and unassigned bit 6.
        let faults = decode_faults(0b1111_1111);
        assert_eq!(faults, FaultCodeField::ALL.to_vec());
    }

    #[test]
    fn high_bits_are_examined() {
        assert_eq!(decode_faults(1 << 7), vec![FaultCodeField::Interlock]);
        assert_eq!(
            decode_faults((1 << 2) | (1 << 5)),
            vec![FaultCodeField::LaserPower, FaultCodeField::BaseTemperature]
        );
        assert!(decode_faults(1 << 15).is_empty());
    }

    #[test]
    fn fault_code_must_be_numeric() {
        assert_eq!(parse_fault_code("?F", " 12 ").ok(), Some(12));
        assert!(parse_fault_code("?F", "E12").is_err());
        assert!(parse_fault_code("?F", "70000").is_err());
    }

    #[test]
    fn device_state_collapses_high_codes() {
        assert_eq!(DeviceState::from_code(0), Some(DeviceState::Warmup));
        assert_eq!(DeviceState::from_code(3), Some(DeviceState::LaserEmissionActive));
        assert_eq!(DeviceState::from_code(5), Some(DeviceState::Fault));
        assert_eq!(DeviceState::from_code(6), Some(DeviceState::Fault));
        assert_eq!(DeviceState::from_code(130), Some(DeviceState::Fault));
        assert_eq!(DeviceState::from_code(1), None);
    }

    #[test]
    fn usb_configuration_table() {
        assert_eq!(
            UsbConfiguration::from_token("1"),
            Some(UsbConfiguration::VirtualSerialPort)
        );
        assert_eq!(UsbConfiguration::StandardUsb.token(), "0");
        assert_eq!(UsbConfiguration::VirtualSerialPort.token(), "1");
        assert_eq!(Switch::On.token(), "1");
        assert_eq!(UsbConfiguration::from_token("2"), None);
    }

    #[test]
    fn numbers_accept_surrounding_whitespace() {
        assert_eq!(parse_number("?P", " 42.5").ok(), Some(42.5));
        assert!(parse_number("?P", "n/a").is_err());
    }
}
