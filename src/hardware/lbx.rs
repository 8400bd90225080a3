//! Oxxius LBX diode laser driver
//!
//! Protocol Overview:
//! - Format: ASCII command/response over RS-232 or USB virtual serial port
//! - Line: 9600 baud, 8N1, no flow control
//! - Command terminator: CR (\r)
//! - Response terminator: CR+LF (\r\n)
//! - Commands: `DL 1`, `PM 12.5`, `ACC 1`, `TTL 1`, `CM 80`, `AM 0`
//! - Queries: `?DL`, `?P`, `?SP`, `?MAXLP`, `?ACC`, `?TTL`, `?SC`
//!
//! Behind an L6CC combiner every frame is preceded by the channel token
//! (`L1 ?SP`). Use [`L6ccCombiner::lbx`](super::L6ccCombiner::lbx) to get a
//! handle that borrows the combiner's connection.
//!
//! Mode interlocks:
//! - Digital (TTL) modulation only works in constant-current mode. Enabling
//!   it while the laser is in constant-power mode is blocked.
//! - Power setpoint changes have no effect in constant-current mode, and
//!   current setpoint changes have none in constant-power mode. Both are sent
//!   anyway with a warning; the device decides.
//!
//! # Usage
//!
//! ```rust,ignore
//! use oxxius_laser::hardware::{EmissionControl, LbxLaser, ModulationControl};
//! use oxxius_laser::state::Switch;
//!
//! let laser = LbxLaser::open(&settings, Profile::Current)?;
//! laser.set_constant_current(Switch::On)?;
//! let _ = laser.set_digital_modulation(Switch::On)?;
//! laser.enable()?;
//! ```

use super::capabilities::{
    format_value, power_rejection, ConstantCurrentControl, EmissionControl, ModulationControl,
    OxxiusDevice,
};
use super::{device_span, Link, SetOutcome};
use crate::connection::{Connection, Prefix};
use crate::error::{LaserError, LaserResult, ValidationError};
use crate::protocol::{Command, Profile};
use crate::state::Switch;
use crate::transport::Transport;
use tracing::{info, warn, Span};

/// Oxxius LBX laser, stand-alone or on a combiner channel.
pub struct LbxLaser<'a> {
    link: Link<'a>,
    prefix: Prefix,
    span: Span,
}

impl LbxLaser<'static> {
    /// Take ownership of `transport` and handshake with the laser.
    pub fn new(transport: impl Transport + 'static, profile: Profile) -> LaserResult<Self> {
        Ok(Self::from_connection(Connection::new(transport, profile)?))
    }

    /// Open the serial port described by `settings`.
    #[cfg(feature = "instrument_serial")]
    pub fn open(settings: &crate::config::SerialSettings, profile: Profile) -> LaserResult<Self> {
        Ok(Self::from_connection(Connection::open(settings, profile)?))
    }

    /// Stand-alone laser on an existing connection.
    pub fn from_connection(connection: Connection) -> Self {
        let prefix = Prefix::none();
        let span = device_span("lbx", connection.port_name(), &prefix);
        Self {
            link: Link::Owned(connection),
            prefix,
            span,
        }
    }
}

impl<'a> LbxLaser<'a> {
    /// Laser addressed by `prefix` on a connection owned elsewhere.
    pub fn on_channel(connection: &'a Connection, prefix: Prefix) -> Self {
        let span = device_span("lbx", connection.port_name(), &prefix);
        Self {
            link: Link::Shared(connection),
            prefix,
            span,
        }
    }

    /// Record diagnostics in `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Constant-current mode, or `None` if the profile cannot report it.
    fn known_constant_current(&self) -> LaserResult<Option<Switch>> {
        match self.constant_current() {
            Ok(mode) => Ok(Some(mode)),
            Err(LaserError::Unsupported { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Mode read for a warn-only cross-check; any failure leaves it unknown.
    fn advisory_mode(&self, setting: &'static str, read: LaserResult<Switch>) -> Option<Switch> {
        match read {
            Ok(mode) => Some(mode),
            Err(LaserError::Unsupported { .. }) => None,
            Err(e) => {
                self.span.in_scope(|| {
                    warn!(setting, error = %e, "Could not read mode; skipping cross-check")
                });
                None
            }
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

impl OxxiusDevice for LbxLaser<'_> {
    fn connection(&self) -> &Connection {
        &self.link
    }

    fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    fn span(&self) -> &Span {
        &self.span
    }
}

impl EmissionControl for LbxLaser<'_> {
    fn set_power_setpoint(&self, value: f64) -> LaserResult<SetOutcome> {
        if let Some(rejected) = power_rejection(self, value)? {
            return Ok(rejected);
        }
        if self.advisory_mode("constant current", self.constant_current()) == Some(Switch::On) {
            self.span.in_scope(|| {
                warn!(
                    value,
                    "Laser is in constant-current mode; power setpoint change will not affect output"
                )
            });
        }
        self.set(Command::LaserPower, &format_value(value))
            .map(SetOutcome::Sent)
    }
}

impl ConstantCurrentControl for LbxLaser<'_> {
    fn set_constant_current(&self, value: Switch) -> LaserResult<String> {
        if value == Switch::Off
            && self.advisory_mode("digital modulation", self.digital_modulation())
                == Some(Switch::On)
        {
            self.span.in_scope(|| {
                warn!("Digital modulation is on and requires constant-current mode; switching to constant power anyway")
            });
        }
        let reply = self.set(Command::ConstantCurrent, value.token())?;
        self.span
            .in_scope(|| info!(mode = %value, "Constant-current mode changed"));
        Ok(reply)
    }

    fn set_current_setpoint(&self, value: f64) -> LaserResult<SetOutcome> {
        if !(0.0..=100.0).contains(&value) {
            return Ok(self.reject(ValidationError::CurrentOutOfRange { value }));
        }
        if self.advisory_mode("constant current", self.constant_current()) == Some(Switch::Off) {
            self.span.in_scope(|| {
                warn!(
                    value,
                    "Laser is in constant-power mode; current setpoint change will not affect output"
                )
            });
        }
        self.set(Command::LaserCurrent, &format_value(value))
            .map(SetOutcome::Sent)
    }
}

impl ModulationControl for LbxLaser<'_> {
    fn set_digital_modulation(&self, value: Switch) -> LaserResult<SetOutcome> {
        if self.known_constant_current()? == Some(Switch::Off) {
            self.span.in_scope(|| {
                warn!(
                    requested = %value,
                    "Digital modulation is unavailable in constant-power mode; command not sent"
                )
            });
            return Ok(SetOutcome::Rejected(
                ValidationError::RequiresConstantCurrent,
            ));
        }
        self.set(Command::DigitalModulation, value.token())
            .map(SetOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FaultCodeField;
    use crate::transport::{MockHandle, MockTransport};
    use tracing_test::traced_test;

    fn laser(mock: MockTransport) -> (LbxLaser<'static>, MockHandle) {
        let handle = mock.handle();
        let connection = Connection::without_handshake(mock, Profile::Current);
        (LbxLaser::from_connection(connection), handle)
    }

    fn sent_commands(handle: &MockHandle, mnemonic: &str) -> Vec<String> {
        handle
            .written()
            .into_iter()
            .filter(|frame| frame.starts_with(mnemonic) && frame.contains(' '))
            .collect()
    }

    #[test]
    fn power_setpoint_in_range_is_sent_once() {
        let (laser, handle) = laser(
            MockTransport::new()
                .with_reply("?MAXLP", "100")
                .with_reply("?ACC", "0")
                .with_reply("PM 50", "OK"),
        );

        let outcome = laser.set_power_setpoint(50.0).unwrap();
        assert_eq!(outcome, SetOutcome::Sent("OK".to_string()));
        assert_eq!(sent_commands(&handle, "PM"), vec!["PM 50".to_string()]);
    }

    #[test]
    #[traced_test]
    fn power_setpoint_out_of_range_is_rejected() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?MAXLP", "100"));

        let outcome = laser.set_power_setpoint(150.0).unwrap();
        assert_eq!(
            outcome,
            SetOutcome::Rejected(ValidationError::PowerOutOfRange {
                value: 150.0,
                max: 100.0
            })
        );
        assert!(sent_commands(&handle, "PM").is_empty());
        assert!(logs_contain("Setting rejected"));

        let outcome = laser.set_power_setpoint(-1.0).unwrap();
        assert!(!outcome.is_sent());
    }

    #[test]
    #[traced_test]
    fn power_change_in_constant_current_mode_warns_but_sends() {
        let (laser, handle) = laser(
            MockTransport::new()
                .with_reply("?MAXLP", "100")
                .with_reply("?ACC", "1"),
        );

        assert!(laser.set_power_setpoint(20.0).unwrap().is_sent());
        assert!(logs_contain("will not affect output"));
        assert_eq!(sent_commands(&handle, "PM"), vec!["PM 20".to_string()]);
    }

    #[test]
    #[traced_test]
    fn leaving_constant_current_with_modulation_on_warns() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?TTL", "1"));

        laser.set_constant_current(Switch::Off).unwrap();
        assert!(logs_contain("requires constant-current mode"));
        assert_eq!(sent_commands(&handle, "ACC"), vec!["ACC 0".to_string()]);
    }

    #[test]
    #[traced_test]
    fn digital_modulation_is_blocked_in_constant_power_mode() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?ACC", "0"));

        let outcome = laser.set_digital_modulation(Switch::On).unwrap();
        assert_eq!(
            outcome,
            SetOutcome::Rejected(ValidationError::RequiresConstantCurrent)
        );
        assert!(sent_commands(&handle, "TTL").is_empty());
        assert!(logs_contain("unavailable in constant-power mode"));
    }

    #[test]
    fn digital_modulation_is_sent_in_constant_current_mode() {
        let (laser, handle) = laser(
            MockTransport::new()
                .with_reply("?ACC", "1")
                .with_reply("TTL 1", "OK"),
        );

        assert!(laser.set_digital_modulation(Switch::On).unwrap().is_sent());
        assert_eq!(sent_commands(&handle, "TTL"), vec!["TTL 1".to_string()]);
    }

    #[test]
    #[traced_test]
    fn current_setpoint_is_a_percentage() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?ACC", "1"));

        assert!(!laser.set_current_setpoint(100.5).unwrap().is_sent());
        assert!(logs_contain("Setting rejected"));
        assert_eq!(
            laser.set_current_setpoint(-0.1).unwrap(),
            SetOutcome::Rejected(ValidationError::CurrentOutOfRange { value: -0.1 })
        );
        assert!(!laser.set_current_setpoint(f64::NAN).unwrap().is_sent());
        assert!(laser.set_current_setpoint(0.0).unwrap().is_sent());
        assert!(laser.set_current_setpoint(80.0).unwrap().is_sent());
        assert!(laser.set_current_setpoint(100.0).unwrap().is_sent());
        assert_eq!(
            sent_commands(&handle, "CM"),
            vec!["CM 0", "CM 80", "CM 100"]
        );
    }

    #[test]
    #[traced_test]
    fn unreadable_mode_does_not_stop_advisory_commands() {
        let (laser, handle) = laser(
            MockTransport::new()
                .with_reply("?TTL", "ERR")
                .with_reply("?ACC", "?")
                .with_reply("?MAXLP", "100"),
        );

        laser.set_constant_current(Switch::Off).unwrap();
        assert!(laser.set_power_setpoint(10.0).unwrap().is_sent());
        assert!(laser.set_current_setpoint(50.0).unwrap().is_sent());
        assert!(logs_contain("skipping cross-check"));

        let commands: Vec<String> = handle
            .written()
            .into_iter()
            .filter(|f| !f.starts_with('?'))
            .collect();
        assert_eq!(commands, vec!["ACC 0", "PM 10", "CM 50"]);
    }

    #[test]
    fn unreadable_mode_still_blocks_modulation() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?ACC", "?"));

        assert!(matches!(
            laser.set_digital_modulation(Switch::On),
            Err(LaserError::Decode { .. })
        ));
        assert_eq!(handle.written(), vec!["?ACC"]);
    }

    #[test]
    #[traced_test]
    fn current_change_in_constant_power_mode_warns_but_sends() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?ACC", "0"));

        assert!(laser.set_current_setpoint(42.5).unwrap().is_sent());
        assert!(logs_contain("constant-power mode"));
        assert_eq!(sent_commands(&handle, "CM"), vec!["CM 42.5".to_string()]);
    }

    #[test]
    fn emission_and_readings() {
        let (laser, handle) = laser(
            MockTransport::new()
                .with_reply("?DL", "1")
                .with_reply("?P", "49.8")
                .with_reply("?SC", "?SC 80")
                .with_reply("?F", "4"),
        );

        laser.enable().unwrap();
        laser.disable().unwrap();
        assert!(laser.is_emitting().unwrap());
        assert_eq!(laser.power().unwrap(), 49.8);
        assert_eq!(laser.current_setpoint().unwrap(), 80.0);
        assert_eq!(laser.faults().unwrap(), vec![FaultCodeField::LaserPower]);
        assert_eq!(&handle.written()[..2], ["DL 1", "DL 0"]);
    }

    #[test]
    fn analog_modulation_is_external_control_mode() {
        let (laser, handle) = laser(MockTransport::new().with_reply("?AM", "0"));

        assert_eq!(laser.analog_modulation().unwrap(), Switch::Off);
        laser.set_analog_modulation(Switch::On).unwrap();
        assert_eq!(handle.written(), vec!["?AM", "AM 1"]);
    }

    #[test]
    fn legacy_profile_skips_mode_checks() {
        let mock = MockTransport::new().with_reply("?MAXLP", "100");
        let handle = mock.handle();
        let laser =
            LbxLaser::from_connection(Connection::without_handshake(mock, Profile::Legacy));

        assert!(laser.set_power_setpoint(10.0).unwrap().is_sent());
        assert_eq!(handle.written(), vec!["?MAXLP", "PM 10"]);
        assert!(matches!(
            laser.set_digital_modulation(Switch::On),
            Err(LaserError::Unsupported { .. })
        ));
    }
}
