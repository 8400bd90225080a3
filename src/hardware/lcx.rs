//! Oxxius LCX DPSS laser driver
//!
//! Same framing as the LBX. The LCX has no constant-current mode and no
//! modulation inputs, so it only implements [`EmissionControl`] on top of
//! the shared device base.

use super::capabilities::{EmissionControl, OxxiusDevice};
use super::{device_span, Link};
use crate::connection::{Connection, Prefix};
use crate::error::LaserResult;
use crate::protocol::Profile;
use crate::transport::Transport;
use tracing::Span;

/// Oxxius LCX laser, stand-alone or on a combiner channel.
pub struct LcxLaser<'a> {
    link: Link<'a>,
    prefix: Prefix,
    span: Span,
}

impl LcxLaser<'static> {
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
        let span = device_span("lcx", connection.port_name(), &prefix);
        Self {
            link: Link::Owned(connection),
            prefix,
            span,
        }
    }
}

impl<'a> LcxLaser<'a> {
    /// Laser addressed by `prefix` on a connection owned elsewhere.
    pub fn on_channel(connection: &'a Connection, prefix: Prefix) -> Self {
        let span = device_span("lcx", connection.port_name(), &prefix);
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
}

impl OxxiusDevice for LcxLaser<'_> {
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

impl EmissionControl for LcxLaser<'_> {}
