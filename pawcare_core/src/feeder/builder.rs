//! Type-state builder for `FeederController`.
//!
//! `build()` only exists once a scale and a feed servo are set; `try_build()`
//! is available in any state and reports what is missing.
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use pawcare_traits::clock::{Clock, MonotonicClock};
use pawcare_traits::{DistanceSensor, Scale, Servo};

use crate::bus::Publisher;
use crate::config::{DosingCfg, FeederIdentity, GateCfg, ScaleCalibration};
use crate::error::{BuildError, Result};
use crate::feeder::controller::{Devices, FeederController, Shared};
use crate::feeder::dispenser::Dispenser;
use crate::feeder::gate::Gate;
use crate::feeder::schedule::{Calendar, LocalCalendar, Scheduler};

pub struct Missing;
pub struct Set;

pub struct FeederBuilder<S, M> {
    bus: Arc<dyn Publisher>,
    scale: Option<Box<dyn Scale + Send>>,
    feed_servo: Option<Box<dyn Servo + Send>>,
    gate_servo: Option<Box<dyn Servo + Send>>,
    waste: Option<Box<dyn DistanceSensor + Send>>,
    feed_level: Option<Box<dyn DistanceSensor + Send>>,
    distance_scale: f32,
    dosing: DosingCfg,
    gate: GateCfg,
    calibration: ScaleCalibration,
    identity: FeederIdentity,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    calendar: Option<Arc<dyn Calendar>>,
    start_active: bool,
    _s: PhantomData<S>,
    _m: PhantomData<M>,
}

impl FeederController {
    pub fn builder(bus: Arc<dyn Publisher>) -> FeederBuilder<Missing, Missing> {
        FeederBuilder {
            bus,
            scale: None,
            feed_servo: None,
            gate_servo: None,
            waste: None,
            feed_level: None,
            distance_scale: 1.0,
            dosing: DosingCfg::default(),
            gate: GateCfg::default(),
            calibration: ScaleCalibration::default(),
            identity: FeederIdentity::default(),
            clock: None,
            calendar: None,
            start_active: false,
            _s: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<S, M> FeederBuilder<S, M> {
    fn retag<S2, M2>(self) -> FeederBuilder<S2, M2> {
        FeederBuilder {
            bus: self.bus,
            scale: self.scale,
            feed_servo: self.feed_servo,
            gate_servo: self.gate_servo,
            waste: self.waste,
            feed_level: self.feed_level,
            distance_scale: self.distance_scale,
            dosing: self.dosing,
            gate: self.gate,
            calibration: self.calibration,
            identity: self.identity,
            clock: self.clock,
            calendar: self.calendar,
            start_active: self.start_active,
            _s: PhantomData,
            _m: PhantomData,
        }
    }

    /// Dosing, gate, calibration and identity sections from a loaded config.
    pub fn with_config(mut self, cfg: &pawcare_config::Config) -> Self {
        self.dosing = DosingCfg::from(cfg);
        self.gate = GateCfg::from(&cfg.gate);
        self.calibration = ScaleCalibration::from(&cfg.scale);
        self.identity = FeederIdentity::from(cfg);
        self
    }

    pub fn with_dosing(mut self, dosing: DosingCfg) -> Self {
        self.dosing = dosing;
        self
    }

    pub fn with_gate_cfg(mut self, gate: GateCfg) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_calibration(mut self, calibration: ScaleCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_identity(mut self, identity: FeederIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_gate_servo(mut self, servo: impl Servo + Send + 'static) -> Self {
        self.gate_servo = Some(Box::new(servo));
        self
    }

    /// Waste-tray and hopper rangers.
    pub fn with_rangers(
        mut self,
        waste: impl DistanceSensor + Send + 'static,
        feed_level: impl DistanceSensor + Send + 'static,
    ) -> Self {
        self.waste = Some(Box::new(waste));
        self.feed_level = Some(Box::new(feed_level));
        self
    }

    /// Multiplier applied to every ranger reading, from the persisted calibration.
    pub fn with_distance_scale(mut self, scale: f32) -> Self {
        self.distance_scale = scale;
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to `LocalCalendar`.
    pub fn with_calendar(mut self, calendar: Arc<dyn Calendar>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Skip the initial `start` command.
    pub fn start_active(mut self, active: bool) -> Self {
        self.start_active = active;
        self
    }

    fn validate(&self) -> std::result::Result<(), BuildError> {
        let d = &self.dosing;
        if d.max_loops == 0 {
            return Err(BuildError::InvalidConfig("max_loops must be >= 1"));
        }
        if d.weight_samples == 0 {
            return Err(BuildError::InvalidConfig("weight_samples must be >= 1"));
        }
        if d.weight_min_samples > d.weight_samples {
            return Err(BuildError::InvalidConfig(
                "weight_min_samples must not exceed weight_samples",
            ));
        }
        if !(d.primary_duty.is_finite() && d.secondary_duty.is_finite())
            || d.primary_duty <= 0.0
            || d.secondary_duty <= 0.0
            || d.primary_duty > 100.0
            || d.secondary_duty > 100.0
        {
            return Err(BuildError::InvalidConfig("servo duties must be in (0, 100]"));
        }
        if !self.calibration.reference_unit.is_finite() || self.calibration.reference_unit == 0.0 {
            return Err(BuildError::InvalidConfig(
                "reference_unit must be finite and non-zero",
            ));
        }
        if !self.distance_scale.is_finite() || self.distance_scale <= 0.0 {
            return Err(BuildError::InvalidConfig("distance_scale must be > 0"));
        }
        if self.gate.ramp_steps == 0 {
            return Err(BuildError::InvalidConfig("gate ramp_steps must be >= 1"));
        }
        if self.identity.status_interval_ms == 0 {
            return Err(BuildError::InvalidConfig("status interval must be > 0"));
        }
        Ok(())
    }

    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<FeederController> {
        self.validate().map_err(eyre::Report::new)?;
        let scale = self
            .scale
            .ok_or_else(|| eyre::Report::new(BuildError::MissingScale))?;
        let feed_servo = self
            .feed_servo
            .ok_or_else(|| eyre::Report::new(BuildError::MissingServo))?;

        let clock: Arc<dyn Clock + Send + Sync> = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let calendar: Arc<dyn Calendar> = self.calendar.unwrap_or_else(|| Arc::new(LocalCalendar));

        let dispenser = Dispenser::new(
            scale,
            feed_servo,
            self.dosing,
            self.calibration,
            Arc::clone(&clock),
        );
        let gate = self
            .gate_servo
            .map(|servo| Gate::new(servo, self.gate, Arc::clone(&clock)));

        tracing::debug!(
            gate = gate.is_some(),
            rangers = self.waste.is_some() || self.feed_level.is_some(),
            distance_scale = self.distance_scale,
            "feeder controller built"
        );

        Ok(FeederController {
            shared: Arc::new(Shared {
                devices: Mutex::new(Devices {
                    dispenser,
                    gate,
                    waste: self.waste,
                    feed_level: self.feed_level,
                    distance_scale: self.distance_scale,
                }),
                active: AtomicBool::new(self.start_active),
                scheduler: Scheduler::new(calendar),
                bus: self.bus,
                identity: self.identity,
            }),
        })
    }
}

impl<M> FeederBuilder<Missing, M> {
    pub fn with_scale(mut self, scale: impl Scale + Send + 'static) -> FeederBuilder<Set, M> {
        self.scale = Some(Box::new(scale));
        self.retag()
    }
}

impl<S> FeederBuilder<S, Missing> {
    pub fn with_feed_servo(mut self, servo: impl Servo + Send + 'static) -> FeederBuilder<S, Set> {
        self.feed_servo = Some(Box::new(servo));
        self.retag()
    }
}

impl FeederBuilder<Set, Set> {
    pub fn build(self) -> Result<FeederController> {
        self.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingBus;
    use pawcare_hardware::sim::{SimBowl, SimulatedFeedServo, SimulatedScale};

    fn bus() -> Arc<dyn Publisher> {
        Arc::new(RecordingBus::new())
    }

    #[test]
    fn try_build_reports_missing_devices() {
        let err = FeederController::builder(bus()).try_build().err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingScale)
        ));

        let bowl = SimBowl::new(0.0);
        let err = FeederController::builder(bus())
            .with_scale(SimulatedScale::new(bowl, 1.0))
            .try_build()
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingServo)
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let bowl = SimBowl::new(0.0);
        let err = FeederController::builder(bus())
            .with_scale(SimulatedScale::new(bowl.clone(), 1.0))
            .with_feed_servo(SimulatedFeedServo::new(bowl, 1.0))
            .with_distance_scale(0.0)
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("distance_scale"));
    }

    #[test]
    fn builds_idle_by_default() {
        let bowl = SimBowl::new(0.0);
        let feeder = FeederController::builder(bus())
            .with_scale(SimulatedScale::new(bowl.clone(), 1.0))
            .with_feed_servo(SimulatedFeedServo::new(bowl, 1.0))
            .build()
            .unwrap();
        assert!(!feeder.is_active());
        assert!(feeder.pending_schedule().is_none());
        assert_eq!(feeder.topic("feeding"), "pet/manager/topic/feeding");
    }
}
