//! Device capabilities
//!
//! Oxxius devices share one wire protocol but not one feature set, so each
//! feature group is a small trait and a device implements the ones it has:
//!
//! - every device (lasers and the combiner): [`OxxiusDevice`]
//! - LBX and LCX lasers: [`EmissionControl`]
//! - LBX lasers: [`ConstantCurrentControl`] + [`ModulationControl`]
//!
//! The traits are built on the connection's `get`/`set` primitives and carry
//! the validation policy. A setter whose argument violates a domain
//! constraint logs the violation, sends nothing and returns
//! [`SetOutcome::Rejected`]. Cross-field inconsistencies that the device
//! itself arbitrates are only logged as warnings.
//!
//! All traits are object safe, so generic code can take `&dyn EmissionControl`.
//!
//! # Example
//!
//! ```rust,ignore
//! fn ramp(laser: &dyn EmissionControl, target_mw: f64) -> LaserResult<()> {
//!     if laser.set_power_setpoint(target_mw)?.is_sent() {
//!         laser.enable()?;
//!     }
//!     Ok(())
//! }
//! ```

use super::SetOutcome;
use crate::connection::{Connection, Prefix};
use crate::error::{LaserError, LaserResult, ValidationError};
use crate::protocol::{Command, Query};
use crate::state::{self, DeviceState, FaultCodeField, Switch};
use tracing::{error, Span};

/// Capability: shared base of every Oxxius device
///
/// Identification, temperature, faults and state. Implementors only supply
/// the connection, their channel prefix and their logging span.
pub trait OxxiusDevice {
    /// Transaction engine this device talks through.
    fn connection(&self) -> &Connection;

    /// Channel prefix; empty for stand-alone devices.
    fn prefix(&self) -> &Prefix;

    /// Span all diagnostics for this device are recorded in.
    fn span(&self) -> &Span;

    /// Query `query` on this device's channel.
    fn get(&self, query: Query) -> LaserResult<String> {
        self.connection().get(self.prefix(), query)
    }

    /// Send `cmd` with `value` on this device's channel.
    fn set(&self, cmd: Command, value: &str) -> LaserResult<String> {
        self.connection().set(self.prefix(), cmd, value)
    }

    /// Query a boolean setting.
    fn get_switch(&self, query: Query) -> LaserResult<Switch> {
        let reply = self.get(query)?;
        state::parse_switch(self.connection().query_mnemonic(query)?, &reply)
    }

    /// Query a numeric reading.
    fn get_number(&self, query: Query) -> LaserResult<f64> {
        let reply = self.get(query)?;
        state::parse_number(self.connection().query_mnemonic(query)?, &reply)
    }

    /// Log a rejected setting and build the outcome.
    fn reject(&self, reason: ValidationError) -> SetOutcome {
        self.span()
            .in_scope(|| error!(%reason, "Setting rejected; command not sent"));
        SetOutcome::Rejected(reason)
    }

    /// Base plate temperature, as reported (degrees C, unconverted).
    fn temperature(&self) -> LaserResult<String> {
        self.get(Query::BasePlateTemperature)
    }

    /// Raw 16-bit fault code.
    fn fault_code(&self) -> LaserResult<u16> {
        let reply = self.get(Query::FaultCode)?;
        state::parse_fault_code(self.connection().query_mnemonic(Query::FaultCode)?, &reply)
    }

    /// Active faults, lowest bit first. Empty when the device is healthy.
    fn faults(&self) -> LaserResult<Vec<FaultCodeField>> {
        Ok(state::decode_faults(self.fault_code()?))
    }

    /// Coarse device state.
    ///
    /// `Fault` covers many conditions; see [`faults`](Self::faults).
    fn state(&self) -> LaserResult<DeviceState> {
        let mnemonic = self.connection().query_mnemonic(Query::FaultCode)?;
        let code = self.fault_code()?;
        DeviceState::from_code(code).ok_or_else(|| {
            LaserError::decode(mnemonic, &code.to_string(), "no device state for this code")
        })
    }

    /// Head serial number.
    fn serial_number(&self) -> LaserResult<String> {
        self.get(Query::SerialNumber)
    }

    /// Identification / laser type string.
    fn identification(&self) -> LaserResult<String> {
        self.get(Query::LaserIdentification)
    }

    /// Accumulated operating hours, as reported.
    fn operating_hours(&self) -> LaserResult<String> {
        self.get(Query::LaserOperatingHours)
    }

    /// Interlock status; `On` when the interlock is closed.
    fn interlock_status(&self) -> LaserResult<Switch> {
        self.get_switch(Query::InterlockStatus)
    }

    /// True if the key is turned and the interlock closed.
    fn interlock_is_closed(&self) -> LaserResult<bool> {
        Ok(self.interlock_status()?.is_on())
    }

    /// Clear all fault codes.
    fn reset_faults(&self) -> LaserResult<String> {
        self.set(Command::FaultCodeReset, Switch::Off.token())
    }
}

/// Capability: emission and power control
///
/// # Contract
/// - Powers are in mW.
/// - `set_power_setpoint` accepts `0 <= value <= max_power()`. Negative and
///   NaN values are rejected without any wire traffic; values above the
///   maximum cost only the `max_power` query.
pub trait EmissionControl: OxxiusDevice {
    /// Start emission.
    fn enable(&self) -> LaserResult<()> {
        self.set(Command::LaserEmission, Switch::On.token())?;
        Ok(())
    }

    /// Stop emission.
    fn disable(&self) -> LaserResult<()> {
        self.set(Command::LaserEmission, Switch::Off.token())?;
        Ok(())
    }

    /// Emission status.
    fn emission_status(&self) -> LaserResult<Switch> {
        self.get_switch(Query::LaserEmission)
    }

    /// True while emitting.
    fn is_emitting(&self) -> LaserResult<bool> {
        Ok(self.emission_status()?.is_on())
    }

    /// Maximum settable power.
    fn max_power(&self) -> LaserResult<f64> {
        self.get_number(Query::MaximumLaserPower)
    }

    /// Measured optical power.
    fn power(&self) -> LaserResult<f64> {
        self.get_number(Query::LaserPower)
    }

    /// Power setpoint.
    fn power_setpoint(&self) -> LaserResult<f64> {
        self.get_number(Query::LaserPowerSetpoint)
    }

    /// Change the power setpoint.
    fn set_power_setpoint(&self, value: f64) -> LaserResult<SetOutcome> {
        if let Some(rejected) = power_rejection(self, value)? {
            return Ok(rejected);
        }
        self.set(Command::LaserPower, &format_value(value))
            .map(SetOutcome::Sent)
    }

    /// Same as [`set_power_setpoint`](Self::set_power_setpoint).
    fn set_power(&self, value: f64) -> LaserResult<SetOutcome> {
        self.set_power_setpoint(value)
    }

    /// 5-second CDRH emission delay.
    fn cdrh(&self) -> LaserResult<Switch> {
        self.get_switch(Query::FiveSecEmissionDelay)
    }

    /// Enable or disable the CDRH emission delay.
    fn set_cdrh(&self, value: Switch) -> LaserResult<String> {
        self.set(Command::FiveSecEmissionDelay, value.token())
    }

    /// Disable the CDRH emission delay.
    fn disable_cdrh(&self) -> LaserResult<String> {
        self.set_cdrh(Switch::Off)
    }

    /// Temperature regulation loop status.
    fn temperature_regulation(&self) -> LaserResult<Switch> {
        self.get_switch(Query::TemperatureRegulationLoop)
    }

    /// Enable or disable the temperature regulation loop.
    fn set_temperature_regulation(&self, value: Switch) -> LaserResult<String> {
        self.set(Command::TemperatureRegulationLoop, value.token())
    }
}

/// Check `value` against `[0, max_power()]`.
///
/// Negative and NaN values are rejected without querying the device.
/// Returns the logged rejection when the value is out of range.
pub(crate) fn power_rejection<D>(device: &D, value: f64) -> LaserResult<Option<SetOutcome>>
where
    D: EmissionControl + ?Sized,
{
    if value.is_nan() || value < 0.0 {
        return Ok(Some(device.reject(ValidationError::InvalidPower { value })));
    }
    let max = device.max_power()?;
    if value <= max {
        Ok(None)
    } else {
        Ok(Some(device.reject(ValidationError::PowerOutOfRange { value, max })))
    }
}

/// Wire formatting for numeric setpoints.
pub(crate) fn format_value(value: f64) -> String {
    format!("{value}")
}

/// Capability: constant-current operation
///
/// Current setpoints are a percentage of the maximum diode current.
pub trait ConstantCurrentControl: EmissionControl {
    /// Driver mode: `On` for constant current, `Off` for constant power.
    fn constant_current(&self) -> LaserResult<Switch> {
        self.get_switch(Query::ConstantCurrent)
    }

    /// Switch between constant-current and constant-power mode.
    fn set_constant_current(&self, value: Switch) -> LaserResult<String>;

    /// Measured diode current.
    fn current(&self) -> LaserResult<f64> {
        self.get_number(Query::LaserCurrent)
    }

    /// Maximum diode current.
    fn max_current(&self) -> LaserResult<f64> {
        self.get_number(Query::MaximumLaserCurrent)
    }

    /// Current setpoint in percent.
    fn current_setpoint(&self) -> LaserResult<f64> {
        self.get_number(Query::LaserCurrentSetpoint)
    }

    /// Change the current setpoint; accepts `[0, 100]` percent.
    fn set_current_setpoint(&self, value: f64) -> LaserResult<SetOutcome>;
}

/// Capability: digital (TTL) and analog modulation
pub trait ModulationControl: ConstantCurrentControl {
    /// TTL digital modulation.
    fn digital_modulation(&self) -> LaserResult<Switch> {
        self.get_switch(Query::DigitalModulation)
    }

    /// Enable or disable TTL digital modulation.
    fn set_digital_modulation(&self, value: Switch) -> LaserResult<SetOutcome>;

    /// Analog (external) power control.
    fn external_control_mode(&self) -> LaserResult<Switch> {
        self.get_switch(Query::ExternalControlMode)
    }

    /// Enable or disable analog power control.
    ///
    /// 0 V to 5 V maps linearly onto zero to maximum power, and the power
    /// setpoint is ignored while enabled.
    fn set_external_control_mode(&self, value: Switch) -> LaserResult<String> {
        self.set(Command::ExternalControlMode, value.token())
    }

    /// Alias of [`external_control_mode`](Self::external_control_mode).
    fn analog_modulation(&self) -> LaserResult<Switch> {
        self.external_control_mode()
    }

    /// Alias of [`set_external_control_mode`](Self::set_external_control_mode).
    fn set_analog_modulation(&self, value: Switch) -> LaserResult<String> {
        self.set_external_control_mode(value)
    }
}
