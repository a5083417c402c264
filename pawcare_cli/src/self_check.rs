//! `pawcare self-check`: open every device once and report what answered.

use std::time::Duration;

use pawcare_config::Config;
use serde_json::{Value, json};

use crate::devices;

fn outcome<T: serde::Serialize, E: std::fmt::Display>(r: Result<T, E>, failures: &mut u32) -> Value {
    match r {
        Ok(v) => json!({ "ok": true, "value": v }),
        Err(e) => {
            *failures += 1;
            json!({ "ok": false, "error": e.to_string() })
        }
    }
}

/// Returns the number of devices that failed to answer.
pub fn run_self_check(cfg: &Config) -> eyre::Result<u32> {
    let mut failures = 0u32;
    let mut feeder = devices::feeder_devices(cfg)?;
    let timeout = Duration::from_millis(cfg.scale.read_timeout_ms);

    let scale = outcome(feeder.scale.read(timeout), &mut failures);
    let (waste, feed_level) = match feeder.rangers.as_mut() {
        Some((w, f)) => (
            outcome(w.read_mm(), &mut failures),
            outcome(f.read_mm(), &mut failures),
        ),
        None => {
            let missing = || Err::<f32, _>("ranger did not initialize");
            (outcome(missing(), &mut failures), outcome(missing(), &mut failures))
        }
    };
    // Duty 0 only releases the drive, so it is safe to send while idle.
    let feed_servo = outcome(feeder.feed_servo.set_duty(0.0), &mut failures);
    let gate_servo = outcome(feeder.gate_servo.set_duty(0.0), &mut failures);

    let mut collar = devices::collar_devices(cfg, 150.0, 100)?;
    let ppg = outcome(collar.ppg.read_sample(), &mut failures);
    let temperature = outcome(collar.ppg.read_temperature(), &mut failures);
    let accel = outcome(collar.imu.read_accel(), &mut failures);
    let battery = outcome(collar.battery.read_raw(), &mut failures);

    let report = json!({
        "config": cfg.summary(),
        "feeder": {
            "scale": scale,
            "waste_ranger": waste,
            "feed_ranger": feed_level,
            "feed_servo": feed_servo,
            "gate_servo": gate_servo,
        },
        "collar": {
            "ppg": ppg,
            "temperature": temperature,
            "accelerometer": accel,
            "battery": battery,
        },
        "failures": failures,
    });
    println!("{report}");
    Ok(failures)
}
