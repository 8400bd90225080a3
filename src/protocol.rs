//! Oxxius command/query vocabulary.
//!
//! The device protocol is a closed dictionary of short ASCII mnemonics. Two
//! firmware generations use overlapping but incompatible dictionaries (the
//! emission command is `L` on the first generation and `DL` on LBX/LCX/L6CC
//! units, where `L<n>` addresses a combiner channel), so each generation is a
//! separate [`Profile`] chosen when a connection is built. Items are never
//! merged across profiles; asking a profile for an item it lacks yields
//! `None` and the caller reports [`LaserError::Unsupported`].
//!
//! [`LaserError::Unsupported`]: crate::error::LaserError::Unsupported

use serde::{Deserialize, Serialize};
use std::fmt;

/// Settable device parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Enable/disable laser emission.
    LaserEmission,
    /// Laser power setpoint in mW.
    LaserPower,
    /// Laser current setpoint in percent.
    LaserCurrent,
    /// Driver control mode: constant power (0) or constant current (1).
    ConstantCurrent,
    /// TTL digital modulation.
    DigitalModulation,
    /// Analog (external) power control.
    ExternalControlMode,
    /// 5-second CDRH emission delay.
    FiveSecEmissionDelay,
    /// Clear fault codes / reset the unit.
    FaultCodeReset,
    /// Temperature regulation loop.
    TemperatureRegulationLoop,
    /// Combiner power split between the two outputs.
    PercentageSplit,
}

impl Command {
    /// Every command, in declaration order.
    pub const ALL: [Command; 10] = [
        Command::LaserEmission,
        Command::LaserPower,
        Command::LaserCurrent,
        Command::ConstantCurrent,
        Command::DigitalModulation,
        Command::ExternalControlMode,
        Command::FiveSecEmissionDelay,
        Command::FaultCodeReset,
        Command::TemperatureRegulationLoop,
        Command::PercentageSplit,
    ];
}

/// Readable device parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// 16-bit fault/status code.
    FaultCode,
    /// Base plate temperature in degrees C.
    BasePlateTemperature,
    /// 5-second CDRH emission delay.
    FiveSecEmissionDelay,
    /// Accumulated operating hours.
    LaserOperatingHours,
    /// Identification / laser type string.
    LaserIdentification,
    /// Head serial number.
    SerialNumber,
    /// Emission status.
    LaserEmission,
    /// Measured optical power in mW.
    LaserPower,
    /// Power setpoint in mW.
    LaserPowerSetpoint,
    /// Maximum settable power in mW.
    MaximumLaserPower,
    /// Measured diode current.
    LaserCurrent,
    /// Current setpoint in percent.
    LaserCurrentSetpoint,
    /// Maximum diode current.
    MaximumLaserCurrent,
    /// Interlock status (1 = closed).
    InterlockStatus,
    /// Emission key status (1 = on).
    EmissionKeyStatus,
    /// Measured diode voltage.
    LaserVoltage,
    /// Temperature regulation loop status.
    TemperatureRegulationLoop,
    /// Driver control mode.
    ConstantCurrent,
    /// TTL digital modulation.
    DigitalModulation,
    /// Analog (external) power control.
    ExternalControlMode,
    /// Combiner power split.
    PercentageSplit,
    /// Combiner USB port configuration.
    UsbConfiguration,
}

impl Query {
    /// Every query, in declaration order.
    pub const ALL: [Query; 22] = [
        Query::FaultCode,
        Query::BasePlateTemperature,
        Query::FiveSecEmissionDelay,
        Query::LaserOperatingHours,
        Query::LaserIdentification,
        Query::SerialNumber,
        Query::LaserEmission,
        Query::LaserPower,
        Query::LaserPowerSetpoint,
        Query::MaximumLaserPower,
        Query::LaserCurrent,
        Query::LaserCurrentSetpoint,
        Query::MaximumLaserCurrent,
        Query::InterlockStatus,
        Query::EmissionKeyStatus,
        Query::LaserVoltage,
        Query::TemperatureRegulationLoop,
        Query::ConstantCurrent,
        Query::DigitalModulation,
        Query::ExternalControlMode,
        Query::PercentageSplit,
        Query::UsbConfiguration,
    ];
}

/// Protocol dictionary generation, selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// First-generation single-laser firmware.
    Legacy,
    /// LBX / LCX lasers and the L6CC combiner.
    #[default]
    Current,
}

impl Profile {
    /// Mnemonic for `cmd`, or `None` if this profile has no such command.
    pub fn command(self, cmd: Command) -> Option<&'static str> {
        use Command::*;
        match self {
            Profile::Legacy => match cmd {
                LaserEmission => Some("L"),
                LaserPower => Some("PM"),
                LaserCurrent => Some("CM"),
                ConstantCurrent => Some("ACC"),
                ExternalControlMode => Some("AM"),
                FiveSecEmissionDelay => Some("CDRH"),
                FaultCodeReset => Some("RST"),
                TemperatureRegulationLoop => Some("T"),
                DigitalModulation | PercentageSplit => None,
            },
            Profile::Current => Some(match cmd {
                LaserEmission => "DL",
                LaserPower => "PM",
                LaserCurrent => "CM",
                ConstantCurrent => "ACC",
                DigitalModulation => "TTL",
                ExternalControlMode => "AM",
                FiveSecEmissionDelay => "CDRH",
                FaultCodeReset => "RST",
                TemperatureRegulationLoop => "T",
                PercentageSplit => "IPA",
            }),
        }
    }

    /// Mnemonic for `query`, or `None` if this profile has no such query.
    pub fn query(self, query: Query) -> Option<&'static str> {
        use Query::*;
        match self {
            Profile::Legacy => match query {
                FaultCode => Some("?F"),
                BasePlateTemperature => Some("?BT"),
                FiveSecEmissionDelay => Some("?CDRH"),
                LaserOperatingHours => Some("?HH"),
                LaserIdentification => Some("INF?"),
                LaserEmission => Some("?L"),
                LaserPower => Some("?P"),
                LaserPowerSetpoint => Some("?SP"),
                MaximumLaserPower => Some("?MAXLP"),
                LaserCurrent => Some("?C"),
                LaserCurrentSetpoint => Some("?SC"),
                MaximumLaserCurrent => Some("?MAXLC"),
                InterlockStatus => Some("?INT"),
                LaserVoltage => Some("?IV"),
                TemperatureRegulationLoop => Some("?T"),
                ExternalControlMode => Some("?AM"),
                SerialNumber | EmissionKeyStatus | ConstantCurrent | DigitalModulation
                | PercentageSplit | UsbConfiguration => None,
            },
            Profile::Current => Some(match query {
                FaultCode => "?F",
                BasePlateTemperature => "?BT",
                FiveSecEmissionDelay => "?CDRH",
                LaserOperatingHours => "?HH",
                LaserIdentification => "INF?",
                SerialNumber => "?HID",
                LaserEmission => "?DL",
                LaserPower => "?P",
                LaserPowerSetpoint => "?SP",
                MaximumLaserPower => "?MAXLP",
                LaserCurrent => "?C",
                LaserCurrentSetpoint => "?SC",
                MaximumLaserCurrent => "?MAXLC",
                InterlockStatus => "?INT",
                EmissionKeyStatus => "?KEY",
                LaserVoltage => "?IV",
                TemperatureRegulationLoop => "?T",
                ConstantCurrent => "?ACC",
                DigitalModulation => "?TTL",
                ExternalControlMode => "?AM",
                PercentageSplit => "?IPA",
                UsbConfiguration => "?USB",
            }),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Legacy => f.write_str("legacy"),
            Profile::Current => f.write_str("current"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn mnemonics_are_unique_within_each_enumeration() {
        for profile in [Profile::Legacy, Profile::Current] {
            let mut seen = HashSet::new();
            for cmd in Command::ALL {
                if let Some(m) = profile.command(cmd) {
                    assert!(seen.insert(m), "{profile}: duplicate command {m}");
                }
            }

            let mut seen = HashSet::new();
            for query in Query::ALL {
                if let Some(m) = profile.query(query) {
                    assert!(seen.insert(m), "{profile}: duplicate query {m}");
                }
            }
        }
    }

    #[test]
    fn command_and_query_namespaces_are_disjoint() {
        for profile in [Profile::Legacy, Profile::Current] {
            let commands: HashSet<_> = Command::ALL
                .iter()
                .filter_map(|c| profile.command(*c))
                .collect();
            for query in Query::ALL {
                if let Some(m) = profile.query(query) {
                    assert!(!commands.contains(m), "{profile}: {m} is both");
                }
            }
        }
    }

    #[test]
    fn current_profile_wire_tokens() {
        let p = Profile::Current;
        assert_eq!(p.query(Query::FaultCode), Some("?F"));
        assert_eq!(p.command(Command::LaserPower), Some("PM"));
        assert_eq!(p.command(Command::DigitalModulation), Some("TTL"));
        assert_eq!(p.command(Command::PercentageSplit), Some("IPA"));
        assert_eq!(p.command(Command::LaserEmission), Some("DL"));
    }

    #[test]
    fn profiles_disagree_on_emission() {
        assert_eq!(Profile::Legacy.command(Command::LaserEmission), Some("L"));
        assert_eq!(Profile::Legacy.query(Query::LaserEmission), Some("?L"));
        assert_eq!(Profile::Current.query(Query::LaserEmission), Some("?DL"));
    }

    #[test]
    fn legacy_profile_has_no_combiner_vocabulary() {
        assert_eq!(Profile::Legacy.command(Command::PercentageSplit), None);
        assert_eq!(Profile::Legacy.command(Command::DigitalModulation), None);
        assert_eq!(Profile::Legacy.query(Query::UsbConfiguration), None);
    }

    #[test]
    fn every_current_item_is_mapped() {
        assert!(Command::ALL
            .iter()
            .all(|c| Profile::Current.command(*c).is_some()));
        assert!(Query::ALL.iter().all(|q| Profile::Current.query(*q).is_some()));
    }
}
