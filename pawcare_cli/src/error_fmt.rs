//! Human-readable error descriptions and structured JSON error formatting.

use pawcare_core::error::{BuildError, FeederError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingScale => {
                "What happened: No scale was provided to the feeder.\nLikely causes: The HX711 failed to initialize or was not wired into the builder.\nHow to fix: Ensure the scale is created successfully and passed via with_scale(...).".to_string()
            }
            BuildError::MissingServo => {
                "What happened: No feed servo was provided to the feeder.\nLikely causes: The servo PWM pin failed to initialize or was not wired into the builder.\nHow to fix: Ensure the servo is created successfully and passed via with_feed_servo(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(fe) = err.downcast_ref::<FeederError>() {
        return match fe {
            FeederError::Timeout => "What happened: Scale read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing scale.read_timeout_ms in the config.".to_string(),
            FeederError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Wrong --config path, invalid TOML syntax, an out-of-range value, or two devices sharing a pin.\nHow to fix: Fix the file or the named key, then rerun."
            ),
            FeederError::Hardware(msg) | FeederError::HardwareFault(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wrong pin or bus number, loose wiring, or missing GPIO/I2C permissions.\nHow to fix: Check the wiring and the pin numbers in the config; run self-check."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = err
        .chain()
        .map(|c| c.to_string().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(": ");

    if lower.contains("trace csv must have headers") {
        return "Invalid headers in trace CSV. Expected 't_ms,red,ir,ax,ay,az'.".to_string();
    }

    if lower.contains("not enough") && lower.contains("samples") {
        return format!(
            "What happened: Calibration could not collect enough readings ({lower}).\nLikely causes: The sensor is failing intermittently.\nHow to fix: Check the sensor wiring and retry."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration, 3 for hardware, 4 for sensor timeouts, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Config(_)) => 2,
        Some(FeederError::Hardware(_) | FeederError::HardwareFault(_)) => 3,
        Some(FeederError::Timeout) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Config(_)) => "Config",
        Some(FeederError::Hardware(_) | FeederError::HardwareFault(_)) => "Hardware",
        Some(FeederError::Timeout) => "Timeout",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
