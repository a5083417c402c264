//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pawcare", version, about = "Pet-care collar and feeder")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Which ranging sensor a distance calibration targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Channel {
    /// Waste bin level sensor
    Waste,
    /// Food hopper level sensor
    Feed,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the collar acquisition loop, publishing JSON lines on stdout
    Collar {
        /// Replay a recorded sensor trace (CSV: t_ms,red,ir,ax,ay,az)
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,
        /// Stop after this many polls (defaults to the trace length when replaying)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Run on a simulated clock instead of sleeping
        #[arg(long, action = ArgAction::SetTrue)]
        fast: bool,
        /// Pulse rate of the simulated oximeter
        #[arg(long, value_name = "BPM", default_value_t = 150.0)]
        sim_bpm: f32,
        /// Cadence of the simulated accelerometer
        #[arg(long, value_name = "STEPS", default_value_t = 100)]
        sim_steps_per_min: u32,
        /// Die temperature reported while replaying a trace
        #[arg(long, value_name = "CELSIUS", default_value_t = 38.5)]
        trace_temperature: f32,
    },
    /// Run the feeder, reading one command per line from stdin
    Feeder {
        /// Accept feeding commands without a prior `start`
        #[arg(long, action = ArgAction::SetTrue)]
        start: bool,
        /// Publish the status snapshot periodically in the background
        #[arg(long, action = ArgAction::SetTrue)]
        broadcast: bool,
        /// Run actuator pulses on a simulated clock instead of sleeping
        #[arg(long, action = ArgAction::SetTrue)]
        fast: bool,
    },
    /// Compute and persist the ranging scale from a known distance
    CalibrateDistance {
        /// True distance to the target in millimetres
        #[arg(long, value_name = "MM")]
        actual_mm: f32,
        /// Sensor to calibrate
        #[arg(long, value_enum, default_value_t = Channel::Waste)]
        channel: Channel,
        /// Override the calibration file from the config
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Distance reported by the simulated sensor
        #[arg(long, value_name = "MM", default_value_t = 100.0)]
        sim_raw_mm: f32,
    },
    /// Tare the load cell and compute counts per gram from a known mass
    CalibrateScale {
        /// Mass placed on the scale after taring
        #[arg(long, value_name = "GRAMS")]
        known_grams: f32,
        /// Do not wait for Enter before weighing the known mass
        #[arg(long, action = ArgAction::SetTrue)]
        no_wait: bool,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
