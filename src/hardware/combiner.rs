//! Oxxius L6CC laser combiner driver
//!
//! The combiner owns the serial link. Up to six lasers sit behind it and are
//! addressed by channel token (`L1`..`L6`) in front of each frame. Channel
//! handles from [`L6ccCombiner::lbx`] / [`L6ccCombiner::lcx`] borrow the
//! combiner's [`Connection`] and cannot outlive it.
//!
//! A few settings live on the combiner itself but apply per channel. Their
//! mnemonic is the base mnemonic with the channel token appended, with no
//! separator: `?TTLL2` reads the TTL modulation of channel `L2`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let combiner = L6ccCombiner::open(&settings, Profile::Current)?;
//! let red = combiner.lbx("L1");
//! red.enable()?;
//! let _ = combiner.set_percentage_split(40.0)?;
//! ```

use super::capabilities::{format_value, OxxiusDevice};
use super::{device_span, AnyLaser, LbxLaser, LcxLaser, SetOutcome};
use crate::config::{ChannelConfig, LaserKind};
use crate::connection::{Connection, Prefix};
use crate::error::{LaserError, LaserResult, ValidationError};
use crate::protocol::{Command, Profile, Query};
use crate::state::{self, Switch, UsbConfiguration};
use crate::transport::Transport;
use tracing::{info, Span};

/// Oxxius L6CC combiner.
pub struct L6ccCombiner {
    connection: Connection,
    prefix: Prefix,
    span: Span,
}

impl L6ccCombiner {
    /// Take ownership of `transport` and handshake with the combiner.
    pub fn new(transport: impl Transport + 'static, profile: Profile) -> LaserResult<Self> {
        Ok(Self::from_connection(Connection::new(transport, profile)?))
    }

    /// Open the serial port described by `settings`.
    #[cfg(feature = "instrument_serial")]
    pub fn open(settings: &crate::config::SerialSettings, profile: Profile) -> LaserResult<Self> {
        Ok(Self::from_connection(Connection::open(settings, profile)?))
    }

    /// Combiner on an existing connection.
    pub fn from_connection(connection: Connection) -> Self {
        let prefix = Prefix::none();
        let span = device_span("l6cc", connection.port_name(), &prefix);
        Self {
            connection,
            prefix,
            span,
        }
    }

    /// Record diagnostics in `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn channel_span(&self, device: &'static str, prefix: &Prefix) -> Span {
        tracing::info_span!(parent: &self.span, "channel", device, prefix = %prefix)
    }

    // =========================================================================
    // Channel handles
    // =========================================================================

    /// LBX laser on `channel` (e.g. "L1").
    pub fn lbx(&self, channel: &str) -> LbxLaser<'_> {
        let prefix = Prefix::new(channel);
        let span = self.channel_span("lbx", &prefix);
        LbxLaser::on_channel(&self.connection, prefix).with_span(span)
    }

    /// LCX laser on `channel` (e.g. "L3").
    pub fn lcx(&self, channel: &str) -> LcxLaser<'_> {
        let prefix = Prefix::new(channel);
        let span = self.channel_span("lcx", &prefix);
        LcxLaser::on_channel(&self.connection, prefix).with_span(span)
    }

    /// Laser described by a configured channel.
    pub fn laser(&self, channel: &ChannelConfig) -> AnyLaser<'_> {
        match channel.kind {
            LaserKind::Lbx => self.lbx(&channel.prefix).into(),
            LaserKind::Lcx => self.lcx(&channel.prefix).into(),
        }
    }

    // =========================================================================
    // Combiner settings
    // =========================================================================

    /// Power split between the two outputs, in percent.
    pub fn percentage_split(&self) -> LaserResult<f64> {
        self.get_number(Query::PercentageSplit)
    }

    /// Change the power split; accepts `[0, 100]` percent.
    pub fn set_percentage_split(&self, value: f64) -> LaserResult<SetOutcome> {
        if !(0.0..=100.0).contains(&value) {
            return Ok(self.reject(ValidationError::PercentageOutOfRange { value }));
        }
        self.set(Command::PercentageSplit, &format_value(value))
            .map(SetOutcome::Sent)
    }

    /// USB port mode.
    pub fn port_configuration(&self) -> LaserResult<UsbConfiguration> {
        let mnemonic = self.connection.query_mnemonic(Query::UsbConfiguration)?;
        let reply = self.get(Query::UsbConfiguration)?;
        UsbConfiguration::from_token(reply.trim())
            .ok_or_else(|| LaserError::decode(mnemonic, &reply, "unknown USB configuration"))
    }

    /// 5-second CDRH emission delay.
    pub fn cdrh(&self) -> LaserResult<Switch> {
        self.get_switch(Query::FiveSecEmissionDelay)
    }

    /// Enable or disable the CDRH emission delay.
    pub fn set_cdrh(&self, value: Switch) -> LaserResult<String> {
        self.set(Command::FiveSecEmissionDelay, value.token())
    }

    /// Emission key position; `On` when turned.
    pub fn emission_key_status(&self) -> LaserResult<Switch> {
        self.get_switch(Query::EmissionKeyStatus)
    }

    /// Combiner model / laser type string.
    pub fn laser_type(&self) -> LaserResult<String> {
        self.get(Query::LaserIdentification)
    }

    /// Constant-current mode shared by all channels.
    pub fn constant_current_status(&self) -> LaserResult<Switch> {
        self.get_switch(Query::ConstantCurrent)
    }

    /// Switch every channel between constant-current and constant-power mode.
    ///
    /// Switching to constant power also turns off digital modulation on every
    /// channel; the combiner does that on its own.
    pub fn set_constant_current_status(&self, value: Switch) -> LaserResult<String> {
        let reply = self.set(Command::ConstantCurrent, value.token())?;
        self.span.in_scope(|| {
            if value.is_on() {
                info!("All channels in constant-current mode");
            } else {
                info!("All channels in constant-power mode; digital modulation disabled");
            }
        });
        Ok(reply)
    }

    // =========================================================================
    // Per-channel settings
    // =========================================================================

    fn channel_query(&self, query: Query, channel: &str) -> LaserResult<Switch> {
        let mnemonic = format!("{}{}", self.connection.query_mnemonic(query)?, channel.trim());
        let reply = self.connection.get_raw(&self.prefix, &mnemonic)?;
        state::parse_switch(&mnemonic, &reply)
    }

    fn channel_command(&self, cmd: Command, channel: &str, value: Switch) -> LaserResult<String> {
        let mnemonic = format!("{}{}", self.connection.command_mnemonic(cmd)?, channel.trim());
        self.connection
            .set_raw(&self.prefix, &mnemonic, value.token())
    }

    /// TTL digital modulation of `channel`.
    pub fn digital_modulation(&self, channel: &str) -> LaserResult<Switch> {
        self.channel_query(Query::DigitalModulation, channel)
    }

    /// Enable or disable TTL digital modulation of `channel`.
    pub fn set_digital_modulation(&self, channel: &str, value: Switch) -> LaserResult<String> {
        self.channel_command(Command::DigitalModulation, channel, value)
    }

    /// Analog power control of `channel`.
    pub fn external_control_mode(&self, channel: &str) -> LaserResult<Switch> {
        self.channel_query(Query::ExternalControlMode, channel)
    }

    /// Enable or disable analog power control of `channel`.
    pub fn set_external_control_mode(&self, channel: &str, value: Switch) -> LaserResult<String> {
        self.channel_command(Command::ExternalControlMode, channel, value)
    }
}

impl OxxiusDevice for L6ccCombiner {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    fn span(&self) -> &Span {
        &self.span
    }
}
