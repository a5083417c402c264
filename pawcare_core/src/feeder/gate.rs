//! Waste gate servo with a ramped move and drive release.
use std::sync::Arc;
use std::time::Duration;

use pawcare_traits::{Clock, Servo};

use crate::config::GateCfg;
use crate::hw_error::map_hw_error;

const MIN_DUTY: f32 = 2.5;
const MAX_DUTY: f32 = 12.5;

/// Duty cycle (%) for a hobby servo angle in degrees, clamped to [0, 180].
pub fn duty_for_angle(angle: f32) -> f32 {
    let angle = if angle.is_nan() { 0.0 } else { angle.clamp(0.0, 180.0) };
    MIN_DUTY + angle / 180.0 * (MAX_DUTY - MIN_DUTY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePosition {
    Open,
    Closed,
}

pub struct Gate<M: Servo> {
    servo: M,
    cfg: GateCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    /// Last commanded duty; ramps start here.
    duty: f32,
    position: GatePosition,
}

impl<M: Servo> Gate<M> {
    /// The gate is assumed closed at power-up.
    pub fn new(servo: M, cfg: GateCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let duty = cfg.close_duty;
        Self {
            servo,
            cfg,
            clock,
            duty,
            position: GatePosition::Closed,
        }
    }

    pub fn position(&self) -> GatePosition {
        self.position
    }

    pub fn open(&mut self) {
        self.move_to(self.cfg.open_duty);
        self.position = GatePosition::Open;
        tracing::info!("waste gate opened");
    }

    pub fn close(&mut self) {
        self.move_to(self.cfg.close_duty);
        self.position = GatePosition::Closed;
        tracing::info!("waste gate closed");
    }

    pub fn move_to_angle(&mut self, angle: f32) {
        self.move_to(duty_for_angle(angle));
    }

    fn drive(&mut self, duty: f32) {
        if let Err(e) = self.servo.set_duty(duty) {
            let err = map_hw_error(&*e);
            tracing::warn!(duty, error = %err, "gate servo command failed");
        }
    }

    /// Step linearly from the last duty to `target`, hold, then release.
    fn move_to(&mut self, target: f32) {
        let steps = self.cfg.ramp_steps.max(1);
        let from = self.duty;
        for k in 1..=steps {
            let duty = from + (target - from) * k as f32 / steps as f32;
            self.drive(duty);
            if k < steps {
                self.clock.sleep(Duration::from_millis(self.cfg.ramp_step_ms));
            }
        }
        self.clock.sleep(Duration::from_millis(self.cfg.hold_ms));
        self.drive(0.0);
        self.duty = target;
    }
}
