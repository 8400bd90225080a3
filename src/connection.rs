//! Request/reply transaction engine.
//!
//! A [`Connection`] owns one transport and serialises every exchange on it:
//! frame the message with a trailing `\r`, write it, read up to `\r\n`, and
//! strip the terminator. Serial ports report a read timeout by returning no
//! bytes, so an empty reply is only treated as a timeout when the read also
//! took longer than the transport's timeout. A fast empty reply is a valid
//! (empty) answer.
//!
//! The transport sits behind a mutex: a combiner and all channel handles
//! borrowing it share one connection, and only one request may be in flight
//! on it at a time. The device protocol has no correlation identifiers, so
//! interleaving requests would mix up replies.

use crate::error::{LaserError, LaserResult};
use crate::protocol::{Command, Profile, Query};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Reply terminator sent by the device.
pub const REPLY_TERMINATOR: &[u8] = b"\r\n";
/// Terminator appended to every outgoing frame.
pub const COMMAND_TERMINATOR: char = '\r';

/// Channel token identifying one laser behind a shared transport.
///
/// Empty for stand-alone lasers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Prefix(String);

impl Prefix {
    /// No channel addressing.
    pub fn none() -> Self {
        Prefix(String::new())
    }

    /// Channel token such as `L1`.
    pub fn new(token: &str) -> Self {
        Prefix(token.trim().to_string())
    }

    /// True for a stand-alone device.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prepend this prefix to `body`.
    pub fn frame(&self, body: &str) -> String {
        if self.is_empty() {
            body.to_string()
        } else {
            format!("{} {}", self.0, body)
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Prefix {
    fn from(value: &str) -> Self {
        Prefix::new(value)
    }
}

/// Transaction engine over a single transport.
pub struct Connection {
    transport: Mutex<Box<dyn Transport>>,
    profile: Profile,
    port_name: String,
    timeout: Duration,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("port", &self.port_name)
            .field("profile", &self.profile)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Connection {
    /// Take ownership of `transport` and confirm the device is live.
    ///
    /// The input buffer is cleared and the laser current is queried once. A
    /// silent device surfaces as [`LaserError::TransportTimeout`] and no
    /// connection is returned.
    pub fn new(transport: impl Transport + 'static, profile: Profile) -> LaserResult<Self> {
        let connection = Self::without_handshake(transport, profile);
        connection.handshake()?;
        Ok(connection)
    }

    /// Wrap `transport` without talking to the device.
    pub fn without_handshake(transport: impl Transport + 'static, profile: Profile) -> Self {
        let port_name = transport.port_name().to_string();
        let timeout = transport.timeout();
        Self {
            transport: Mutex::new(Box::new(transport)),
            profile,
            port_name,
            timeout,
        }
    }

    /// Open a serial port with the fixed Oxxius line settings and handshake.
    #[cfg(feature = "instrument_serial")]
    pub fn open(settings: &crate::config::SerialSettings, profile: Profile) -> LaserResult<Self> {
        let transport = crate::transport::SerialTransport::open(settings)?;
        Self::new(transport, profile).map_err(|e| {
            if matches!(e, LaserError::TransportTimeout { .. }) {
                tracing::error!(
                    "Connected to '{}' but the device is not responding",
                    settings.port
                );
            }
            e
        })
    }

    fn handshake(&self) -> LaserResult<()> {
        self.transport.lock().reset_input_buffer()?;
        let current = self.get(&Prefix::none(), Query::LaserCurrent)?;
        info!(
            port = %self.port_name,
            profile = %self.profile,
            "Device responded to handshake (current: {})",
            current
        );
        Ok(())
    }

    /// Protocol profile used to resolve mnemonics.
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Port identifier of the underlying transport.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Read timeout of the underlying transport.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Mnemonic for `query` in this connection's profile.
    pub fn query_mnemonic(&self, query: Query) -> LaserResult<&'static str> {
        self.profile
            .query(query)
            .ok_or_else(|| LaserError::Unsupported {
                item: format!("{query:?}"),
                profile: self.profile,
            })
    }

    /// Mnemonic for `cmd` in this connection's profile.
    pub fn command_mnemonic(&self, cmd: Command) -> LaserResult<&'static str> {
        self.profile
            .command(cmd)
            .ok_or_else(|| LaserError::Unsupported {
                item: format!("{cmd:?}"),
                profile: self.profile,
            })
    }

    /// Request `query` and return the reply without terminator or echo.
    pub fn get(&self, prefix: &Prefix, query: Query) -> LaserResult<String> {
        let mnemonic = self.query_mnemonic(query)?;
        self.get_raw(prefix, mnemonic)
    }

    /// Request an arbitrary query mnemonic, e.g. a channel-composed one.
    pub fn get_raw(&self, prefix: &Prefix, mnemonic: &str) -> LaserResult<String> {
        let reply = self.send(&prefix.frame(mnemonic), true)?;
        Ok(strip_echo(&reply, prefix, mnemonic).to_string())
    }

    /// Send `cmd` with `value` and return the raw reply.
    pub fn set(&self, prefix: &Prefix, cmd: Command, value: &str) -> LaserResult<String> {
        let mnemonic = self.command_mnemonic(cmd)?;
        self.set_raw(prefix, mnemonic, value)
    }

    /// Send an arbitrary command mnemonic with `value`.
    pub fn set_raw(&self, prefix: &Prefix, mnemonic: &str, value: &str) -> LaserResult<String> {
        self.send(&prefix.frame(&format!("{mnemonic} {value}")), true)
    }

    /// Send `message` and return the reply with line terminators removed.
    ///
    /// With `raise_timeout` set, an empty reply that took longer than the
    /// transport timeout fails with [`LaserError::TransportTimeout`];
    /// otherwise it is returned as an empty string.
    pub fn send(&self, message: &str, raise_timeout: bool) -> LaserResult<String> {
        let frame = format!("{message}{COMMAND_TERMINATOR}");
        let mut transport = self.transport.lock();

        trace!("Sending to {}: '{}'", self.port_name, frame.escape_default());
        transport.write(frame.as_bytes())?;

        let start = Instant::now();
        let reply = transport.read_until(REPLY_TERMINATOR)?;
        let elapsed = start.elapsed();

        if reply.is_empty() && raise_timeout && elapsed > self.timeout {
            return Err(LaserError::TransportTimeout {
                port: self.port_name.clone(),
                timeout: self.timeout,
            });
        }

        let body = reply.strip_suffix(REPLY_TERMINATOR).unwrap_or(&reply);
        let text = String::from_utf8(body.to_vec()).map_err(|e| {
            LaserError::decode(message, &String::from_utf8_lossy(body), e.to_string())
        })?;
        let text = text.trim_end_matches(['\r', '\n']).to_string();

        debug!("Received from {} ({:?}): '{}'", self.port_name, elapsed, text);
        Ok(text)
    }
}

/// Remove an echoed `prefix`/`mnemonic` (and a following `=`) from a reply.
///
/// Devices may answer `?SP` with `12.5`, `?SP 12.5`, `?SP=12.5`, or with the
/// channel prefix repeated first; all of these yield `12.5`. Only exact
/// tokens are removed, so a reply that merely starts with one of the
/// mnemonic's characters is left intact.
pub fn strip_echo<'a>(reply: &'a str, prefix: &Prefix, mnemonic: &str) -> &'a str {
    let mut rest = reply.trim();
    if !prefix.is_empty() {
        rest = strip_token(rest, prefix.as_str()).unwrap_or(rest);
    }
    let bare = mnemonic.trim_start_matches('?');
    for token in [mnemonic, bare] {
        if let Some(r) = strip_token(rest, token) {
            rest = r.trim_start_matches('=').trim_start();
            break;
        }
    }
    rest
}

/// Strip `token` from the front of `text` if it is followed by a boundary.
fn strip_token<'a>(text: &'a str, token: &str) -> Option<&'a str> {
    if token.is_empty() {
        return None;
    }
    let rest = text.strip_prefix(token)?;
    if rest.is_empty() || rest.starts_with(|c: char| c == '=' || c.is_whitespace()) {
        Some(rest.trim_start())
    } else {
        None
    }
}
