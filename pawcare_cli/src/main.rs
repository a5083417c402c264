#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::cast_precision_loss)]

mod calibrate;
mod cli;
mod collar;
mod devices;
mod error_fmt;
mod feeder;
mod self_check;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use pawcare_config::{Config, Logging};
use pawcare_core::error::FeederError;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        Some(p) => pawcare_config::load_file(p)
            .map_err(|e| eyre::Report::new(FeederError::Config(e.to_string())))?,
        None => Config::default(),
    };
    cfg.validate()
        .map_err(|e| eyre::Report::new(FeederError::Config(e.to_string())))?;
    Ok(cfg)
}

/// Console layer on stderr (stdout carries bus messages), plus an optional JSON file layer.
fn init_tracing(level: &str, json: bool, logging: &Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file '{}' has no file name", path.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn install_shutdown_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let installed = ctrlc::set_handler(move || {
        // Second Ctrl-C: the loop is blocked (e.g. on stdin), leave now.
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    });
    if let Err(e) = installed {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }
    shutdown
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(&cli.log_level, cli.json, &cfg.logging)?;
    tracing::debug!(config = ?cfg.summary(), "configuration loaded");
    let shutdown = install_shutdown_handler();
    let config_path = cli.config.as_deref();

    match cli.cmd {
        Commands::Collar {
            trace,
            ticks,
            fast,
            sim_bpm,
            sim_steps_per_min,
            trace_temperature,
        } => {
            let args = collar::CollarArgs {
                trace: trace.as_deref(),
                ticks,
                fast,
                sim_bpm,
                sim_steps_per_min,
                trace_temperature,
            };
            collar::run_collar(&cfg, &args, &shutdown)?;
        }
        Commands::Feeder {
            start,
            broadcast,
            fast,
        } => {
            let args = feeder::FeederArgs {
                config_path,
                start,
                broadcast,
                fast,
            };
            feeder::run_feeder(&cfg, &args, std::io::stdin().lock(), &shutdown)?;
        }
        Commands::CalibrateDistance {
            actual_mm,
            channel,
            output,
            sim_raw_mm,
        } => {
            let args = calibrate::DistanceArgs {
                config_path,
                actual_mm,
                channel,
                output: output.as_deref(),
                sim_raw_mm,
            };
            calibrate::calibrate_distance(&cfg, &args)?;
        }
        Commands::CalibrateScale {
            known_grams,
            no_wait,
        } => {
            calibrate::calibrate_scale(&cfg, known_grams, no_wait, std::io::stdin().lock())?;
        }
        Commands::SelfCheck => {
            let failures = self_check::run_self_check(&cfg)?;
            if failures > 0 {
                return Err(eyre::Report::new(FeederError::Hardware(format!(
                    "{failures} device(s) failed self-check"
                ))));
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error report handler: {e}");
    }

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}
