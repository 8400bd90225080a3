//! Device facades
//!
//! - [`LbxLaser`]: LBX diode laser (constant current, digital/analog modulation)
//! - [`LcxLaser`]: LCX DPSS laser (emission and power only)
//! - [`L6ccCombiner`]: L6CC combiner owning the transport its channel lasers share
//! - [`AnyLaser`]: either laser, chosen at runtime
//!
//! Stand-alone lasers own their [`Connection`]. Lasers behind a combiner borrow
//! the combiner's connection, so the borrow checker keeps a channel handle from
//! outliving the transport it talks through.

pub mod capabilities;
pub mod combiner;
pub mod lbx;
pub mod lcx;

pub use capabilities::{ConstantCurrentControl, EmissionControl, ModulationControl, OxxiusDevice};
pub use combiner::L6ccCombiner;
pub use lbx::LbxLaser;
pub use lcx::LcxLaser;

use crate::config::LaserKind;
use crate::connection::{Connection, Prefix};
use crate::error::ValidationError;
use std::ops::Deref;
use tracing::Span;

/// Result of a validated setter.
///
/// Validation failures are not errors: the command is simply not sent.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum SetOutcome {
    /// Command transmitted; holds the device reply.
    Sent(String),
    /// Argument rejected locally; nothing was transmitted.
    Rejected(ValidationError),
}

impl SetOutcome {
    /// True if the command went out on the wire.
    pub fn is_sent(&self) -> bool {
        matches!(self, SetOutcome::Sent(_))
    }

    /// Device reply, if the command was sent.
    pub fn reply(&self) -> Option<&str> {
        match self {
            SetOutcome::Sent(reply) => Some(reply),
            SetOutcome::Rejected(_) => None,
        }
    }

    /// Rejection reason, if the command was not sent.
    pub fn rejection(&self) -> Option<&ValidationError> {
        match self {
            SetOutcome::Sent(_) => None,
            SetOutcome::Rejected(reason) => Some(reason),
        }
    }
}

/// A connection that is either owned or borrowed from a combiner.
pub(crate) enum Link<'a> {
    Owned(Connection),
    Shared(&'a Connection),
}

impl Deref for Link<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Link::Owned(connection) => connection,
            Link::Shared(connection) => connection,
        }
    }
}

/// Default span for a device on `port`.
pub(crate) fn device_span(device: &'static str, port: &str, prefix: &Prefix) -> Span {
    tracing::info_span!("oxxius", device, port = %port, prefix = %prefix)
}

/// Either laser family, selected at runtime (e.g. from configuration).
pub enum AnyLaser<'a> {
    /// LBX diode laser
    Lbx(LbxLaser<'a>),
    /// LCX DPSS laser
    Lcx(LcxLaser<'a>),
}

impl<'a> AnyLaser<'a> {
    /// Laser family.
    pub fn kind(&self) -> LaserKind {
        match self {
            AnyLaser::Lbx(_) => LaserKind::Lbx,
            AnyLaser::Lcx(_) => LaserKind::Lcx,
        }
    }

    /// Emission and power control, available on every laser.
    pub fn emission(&self) -> &dyn EmissionControl {
        match self {
            AnyLaser::Lbx(laser) => laser,
            AnyLaser::Lcx(laser) => laser,
        }
    }

    /// Constant-current control, if this laser supports it.
    pub fn constant_current(&self) -> Option<&dyn ConstantCurrentControl> {
        match self {
            AnyLaser::Lbx(laser) => Some(laser),
            AnyLaser::Lcx(_) => None,
        }
    }

    /// Modulation control, if this laser supports it.
    pub fn modulation(&self) -> Option<&dyn ModulationControl> {
        match self {
            AnyLaser::Lbx(laser) => Some(laser),
            AnyLaser::Lcx(_) => None,
        }
    }
}

impl<'a> From<LbxLaser<'a>> for AnyLaser<'a> {
    fn from(laser: LbxLaser<'a>) -> Self {
        AnyLaser::Lbx(laser)
    }
}

impl<'a> From<LcxLaser<'a>> for AnyLaser<'a> {
    fn from(laser: LcxLaser<'a>) -> Self {
        AnyLaser::Lcx(laser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Profile;
    use crate::transport::MockTransport;

    #[test]
    fn outcome_accessors() {
        let sent = SetOutcome::Sent("OK".to_string());
        assert!(sent.is_sent());
        assert_eq!(sent.reply(), Some("OK"));

        let rejected = SetOutcome::Rejected(ValidationError::RequiresConstantCurrent);
        assert!(!rejected.is_sent());
        assert_eq!(
            rejected.rejection(),
            Some(&ValidationError::RequiresConstantCurrent)
        );
    }

    #[test]
    fn capabilities_follow_laser_family() {
        let lbx = LbxLaser::from_connection(Connection::without_handshake(
            MockTransport::new(),
            Profile::Current,
        ));
        let lcx = LcxLaser::from_connection(Connection::without_handshake(
            MockTransport::new(),
            Profile::Current,
        ));

        let lbx = AnyLaser::from(lbx);
        let lcx = AnyLaser::from(lcx);
        assert_eq!(lbx.kind(), LaserKind::Lbx);
        assert!(lbx.modulation().is_some());
        assert!(lcx.constant_current().is_none());
        assert!(lcx.modulation().is_none());
    }
}
