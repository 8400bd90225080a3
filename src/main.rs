//! CLI Entry Point for the Oxxius driver
//!
//! Provides command-line access to a laser or combiner on one serial port:
//! - Read status (identification, emission, power, faults)
//! - Switch emission and change the power setpoint
//! - Combiner power split and per-channel modulation
//! - Raw frames for protocol debugging
//!
//! # Usage
//!
//! ```bash
//! oxxius --port /dev/ttyUSB0 status
//! oxxius --config oxxius.toml emission on --channel L1
//! oxxius --config oxxius.toml power 25 --channel L1
//! oxxius --port COM3 raw "?SP"
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oxxius_laser::config::{ChannelConfig, DeviceKind, DriverConfig, LaserKind};
use oxxius_laser::hardware::{
    AnyLaser, EmissionControl, L6ccCombiner, LbxLaser, LcxLaser, OxxiusDevice, SetOutcome,
};
use oxxius_laser::logging::{self, LoggingConfig};
use oxxius_laser::protocol::Profile;
use oxxius_laser::state::Switch;
use oxxius_laser::Connection;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oxxius")]
#[command(about = "Control Oxxius lasers and laser combiners over a serial port", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port; overrides the configuration file
    #[arg(long, global = true)]
    port: Option<String>,

    /// Protocol profile; overrides the configuration file
    #[arg(long, global = true, value_enum)]
    profile: Option<ProfileArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print device status
    Status {
        /// Combiner channel (e.g. L1)
        #[arg(long)]
        channel: Option<String>,
    },

    /// Switch emission on or off
    Emission {
        state: OnOff,

        /// Combiner channel (e.g. L1)
        #[arg(long)]
        channel: Option<String>,
    },

    /// Set the power setpoint in mW
    Power {
        milliwatts: f64,

        /// Combiner channel (e.g. L1)
        #[arg(long)]
        channel: Option<String>,
    },

    /// Set the combiner power split in percent
    Split { percent: f64 },

    /// Switch digital modulation of a combiner channel
    Modulation {
        state: OnOff,

        /// Combiner channel (e.g. L2)
        #[arg(long)]
        channel: String,
    },

    /// Send a raw frame and print the reply
    Raw { message: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum OnOff {
    On,
    Off,
}

impl From<OnOff> for Switch {
    fn from(value: OnOff) -> Self {
        match value {
            OnOff::On => Switch::On,
            OnOff::Off => Switch::Off,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Legacy,
    Current,
}

impl From<ProfileArg> for Profile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Legacy => Profile::Legacy,
            ProfileArg::Current => Profile::Current,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    logging::init(LoggingConfig::from_driver_config(&config)?)?;
    tracing::debug!(port = %config.serial.port, profile = %config.profile, "Configuration loaded");

    match config.device.kind {
        DeviceKind::Combiner => {
            let combiner = L6ccCombiner::open(&config.serial, config.profile)
                .with_context(|| format!("Failed to open combiner on {}", config.serial.port))?;
            run_combiner(&config, &combiner, cli.command)
        }
        DeviceKind::Lbx | DeviceKind::Lcx => {
            let connection = Connection::open(&config.serial, config.profile)
                .with_context(|| format!("Failed to open laser on {}", config.serial.port))?;
            let laser: AnyLaser<'static> = if config.device.kind == DeviceKind::Lbx {
                LbxLaser::from_connection(connection).into()
            } else {
                LcxLaser::from_connection(connection).into()
            };
            run_laser(&laser, cli.command)
        }
    }
}

fn load_config(cli: &Cli) -> Result<DriverConfig> {
    let mut config = match (&cli.config, &cli.port) {
        (Some(path), _) => DriverConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        (None, Some(port)) => DriverConfig::from_env(port)?,
        (None, None) => bail!("Either --config or --port is required"),
    };
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(profile) = cli.profile {
        config.profile = profile.into();
    }
    config.validate()?;
    Ok(config)
}

fn run_laser(laser: &AnyLaser<'_>, command: Commands) -> Result<()> {
    match command {
        Commands::Status { channel: None } => print_laser_status(laser),
        Commands::Emission {
            state,
            channel: None,
        } => switch_emission(laser, state.into()),
        Commands::Power {
            milliwatts,
            channel: None,
        } => set_power(laser, milliwatts),
        Commands::Raw { message } => {
            println!("{}", laser.emission().connection().send(&message, true)?);
            Ok(())
        }
        Commands::Split { .. } | Commands::Modulation { .. } => {
            bail!("This command needs a combiner (device.kind = \"combiner\")")
        }
        _ => bail!("--channel is only valid for a combiner"),
    }
}

fn run_combiner(config: &DriverConfig, combiner: &L6ccCombiner, command: Commands) -> Result<()> {
    match command {
        Commands::Status { channel: None } => print_combiner_status(combiner),
        Commands::Status {
            channel: Some(channel),
        } => print_laser_status(&channel_laser(config, combiner, &channel)?),
        Commands::Emission { state, channel } => {
            let channel = channel.ok_or_else(|| anyhow!("--channel is required"))?;
            switch_emission(&channel_laser(config, combiner, &channel)?, state.into())
        }
        Commands::Power {
            milliwatts,
            channel,
        } => {
            let channel = channel.ok_or_else(|| anyhow!("--channel is required"))?;
            set_power(&channel_laser(config, combiner, &channel)?, milliwatts)
        }
        Commands::Split { percent } => report(combiner.set_percentage_split(percent)?),
        Commands::Modulation { state, channel } => {
            let reply = combiner.set_digital_modulation(&channel, state.into())?;
            println!("{reply}");
            Ok(())
        }
        Commands::Raw { message } => {
            println!("{}", combiner.connection().send(&message, true)?);
            Ok(())
        }
    }
}

fn channel_laser<'a>(
    config: &DriverConfig,
    combiner: &'a L6ccCombiner,
    channel: &str,
) -> Result<AnyLaser<'a>> {
    let channel = config.channel(channel).cloned().unwrap_or_else(|| {
        tracing::warn!(channel, "Channel not configured; assuming an LBX laser");
        ChannelConfig {
            prefix: channel.to_string(),
            kind: LaserKind::Lbx,
        }
    });
    Ok(combiner.laser(&channel))
}

fn print_laser_status(laser: &AnyLaser<'_>) -> Result<()> {
    let emission = laser.emission();
    println!("Laser:        {:?}", laser.kind());
    println!("Identity:     {}", emission.identification()?);
    println!("Emission:     {}", on_off(emission.is_emitting()?));
    println!("Power:        {} mW", emission.power()?);
    println!("Setpoint:     {} mW", emission.power_setpoint()?);
    println!("Max power:    {} mW", emission.max_power()?);
    println!("Temperature:  {} C", emission.temperature()?);
    println!("State:        {:?}", emission.state()?);
    println!("Faults:       {:?}", emission.faults()?);
    if let Some(cc) = laser.constant_current() {
        println!("Const. curr.: {}", on_off(cc.constant_current()?.is_on()));
    }
    Ok(())
}

fn print_combiner_status(combiner: &L6ccCombiner) -> Result<()> {
    println!("Type:         {}", combiner.laser_type()?);
    println!("Interlock:    {}", on_off(combiner.interlock_is_closed()?));
    println!("Key:          {}", on_off(combiner.emission_key_status()?.is_on()));
    println!("Split:        {} %", combiner.percentage_split()?);
    println!("Const. curr.: {}", on_off(combiner.constant_current_status()?.is_on()));
    println!("USB:          {:?}", combiner.port_configuration()?);
    Ok(())
}

fn switch_emission(laser: &AnyLaser<'_>, state: Switch) -> Result<()> {
    if state.is_on() {
        laser.emission().enable()?;
    } else {
        laser.emission().disable()?;
    }
    println!("Emission {}", on_off(state.is_on()));
    Ok(())
}

fn set_power(laser: &AnyLaser<'_>, milliwatts: f64) -> Result<()> {
    report(laser.emission().set_power_setpoint(milliwatts)?)
}

fn report(outcome: SetOutcome) -> Result<()> {
    match outcome {
        SetOutcome::Sent(reply) => {
            println!("OK {reply}");
            Ok(())
        }
        SetOutcome::Rejected(reason) => Err(anyhow!("Rejected: {reason}")),
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
