//! # Oxxius Laser Driver Library
//!
//! Host-side control of Oxxius LBX and LCX lasers and the L6CC laser combiner
//! over their ASCII serial protocol.
//!
//! ## Crate Structure
//!
//! - **`transport`**: the byte-level `Transport` trait, a `serialport`-backed
//!   implementation and a scripted mock.
//! - **`connection`**: the request/reply transaction engine. Frames messages,
//!   detects read timeouts and strips echoed mnemonics.
//! - **`protocol`**: the command/query vocabulary and the mnemonic tables of
//!   each protocol profile.
//! - **`state`**: typed views of replies (switches, fault bits, device state,
//!   USB mode).
//! - **`hardware`**: capability traits and the LBX / LCX / L6CC facades that
//!   validate settings before they reach the wire.
//! - **`config`**: Figment-based driver configuration.
//! - **`logging`**: tracing-subscriber setup for binaries.
//! - **`error`**: the crate error type.
//!
//! ## Example
//!
//! ```
//! use oxxius_laser::hardware::{EmissionControl, L6ccCombiner};
//! use oxxius_laser::protocol::Profile;
//! use oxxius_laser::transport::MockTransport;
//!
//! let transport = MockTransport::new()
//!     .with_reply("?C", "10.0")
//!     .with_reply("L1 ?MAXLP", "100")
//!     .with_reply("L1 ?ACC", "0")
//!     .with_reply("L1 PM 25", "OK");
//! let combiner = L6ccCombiner::new(transport, Profile::Current)?;
//! let laser = combiner.lbx("L1");
//! assert!(laser.set_power_setpoint(25.0)?.is_sent());
//! # Ok::<(), oxxius_laser::error::LaserError>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod protocol;
pub mod state;
pub mod transport;

pub use connection::{Connection, Prefix};
pub use error::{LaserError, LaserResult, ValidationError};
pub use hardware::{AnyLaser, L6ccCombiner, LbxLaser, LcxLaser, SetOutcome};
pub use protocol::{Command, Profile, Query};
pub use state::Switch;
