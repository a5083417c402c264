//! `pawcare feeder`: line-oriented command loop over stdin, responses as JSON lines on stdout.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use pawcare_config::{Config, DistanceCalibration};
use pawcare_core::bus::{JsonLinesBus, Publisher};
use pawcare_core::feeder::FeederController;

use crate::collar::clock_for;
use crate::devices::{self, FeederDevices};

/// Resolve a file named in the config relative to the config file's directory.
pub fn resolve_near_config(config: Option<&Path>, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        return file.to_path_buf();
    }
    match config.and_then(Path::parent) {
        Some(dir) => dir.join(file),
        None => file.to_path_buf(),
    }
}

pub struct FeederArgs<'a> {
    pub config_path: Option<&'a Path>,
    pub start: bool,
    pub broadcast: bool,
    pub fast: bool,
}

pub fn build_feeder(cfg: &Config, args: &FeederArgs<'_>, bus: Arc<dyn Publisher>) -> eyre::Result<FeederController> {
    let FeederDevices {
        scale,
        feed_servo,
        gate_servo,
        rangers,
        calibration,
        bowl: _,
    } = devices::feeder_devices(cfg)?;
    let calibration_file = resolve_near_config(args.config_path, &cfg.distance.calibration_file);
    let distance = DistanceCalibration::load_or_default(&calibration_file);

    let mut builder = FeederController::builder(bus)
        .with_config(cfg)
        .with_calibration(calibration)
        .with_gate_servo(gate_servo)
        .with_distance_scale(distance.distance_scale)
        .with_clock(clock_for(args.fast))
        .start_active(args.start);
    if let Some((waste, feed_level)) = rangers {
        builder = builder.with_rangers(waste, feed_level);
    }
    builder.with_scale(scale).with_feed_servo(feed_servo).build()
}

/// Handle commands until EOF or shutdown. Returns the number of commands handled.
pub fn run_feeder(
    cfg: &Config,
    args: &FeederArgs<'_>,
    input: impl BufRead,
    shutdown: &AtomicBool,
) -> eyre::Result<u64> {
    let bus: Arc<dyn Publisher> = Arc::new(JsonLinesBus::new(std::io::stdout()));
    let feeder = build_feeder(cfg, args, bus)?;
    let broadcaster = if args.broadcast {
        Some(feeder.spawn_status_broadcaster()?)
    } else {
        None
    };
    tracing::info!(active = feeder.is_active(), prefix = %cfg.topics.feeder_prefix, "feeder ready");

    let mut handled = 0u64;
    for line in input.lines() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let line = line.wrap_err("read command from stdin")?;
        let cmd = line.trim();
        if cmd.is_empty() || cmd.starts_with('#') {
            continue;
        }
        let out = feeder.handle_raw(cmd);
        handled += 1;
        tracing::debug!(command = cmd, responses = out.len(), "command handled");
    }

    if let Some(pending) = feeder.pending_schedule() {
        tracing::info!(at = %pending.datetime, grams = pending.grams, "dropping pending scheduled feed on exit");
    }
    if let Some(b) = broadcaster {
        b.stop();
    }
    tracing::info!(handled, "feeder stopped");
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_file_sits_next_to_config() {
        let cfg = Path::new("/etc/pawcare/pawcare.toml");
        assert_eq!(
            resolve_near_config(Some(cfg), "config.json"),
            PathBuf::from("/etc/pawcare/config.json")
        );
        assert_eq!(
            resolve_near_config(Some(cfg), "/var/lib/cal.json"),
            PathBuf::from("/var/lib/cal.json")
        );
        assert_eq!(resolve_near_config(None, "config.json"), PathBuf::from("config.json"));
    }
}
