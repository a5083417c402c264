#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pet-care device logic (hardware-agnostic).
//!
//! Two independent stacks share this crate. All hardware goes through the
//! traits in `pawcare_traits`; all outbound messages go through `bus::Publisher`.
//!
//! ## Collar
//!
//! - **Estimation**: heart rate from IR peak intervals, SpO2 from the red/IR
//!   ratio of ratios (`estimator`, `filter`, `stats`)
//! - **Windowing**: bounded PPG sample window with keep-tail eviction (`window`)
//! - **Steps**: magnitude threshold detector with refractory latch (`steps`)
//! - **Loop**: contact gating, periodic publish, battery report, standby (`collar`)
//!
//! ## Feeder
//!
//! - **Commands**: plaintext commands parsed into `FeedingCommand`
//! - **Dosing**: open-loop pulse and closed-loop feed-until-weight with a loop cap
//! - **Schedule**: one pending feed at a time, cancellable until it fires
//! - **Gate**: ramped waste-gate servo moves
//!
//! Estimators never fail: "no reading" is a sentinel value, and the caller
//! decides whether to publish it.

pub mod bus;
pub mod collar;
pub mod config;
pub mod conversions;
pub mod error;
pub mod estimator;
pub mod feeder;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod smoother;
pub mod stats;
pub mod steps;
pub mod util;
pub mod vitals;
pub mod window;

pub use bus::{JsonLinesBus, Publisher, publish_json};
pub use collar::{BatteryPayload, CollarMode, CollarMonitor, HealthPayload, TickSummary};
pub use config::{
    CollarCfg, DosingCfg, EstimatorCfg, FeederIdentity, GateCfg, ScaleCalibration, SmootherCfg,
    StepCfg,
};
pub use error::{BuildError, FeederError, Result};
pub use estimator::{
    HeartRate, IntervalMethod, IntervalStats, NoReading, estimate_heart_rate, estimate_spo2,
    try_estimate_heart_rate,
};
pub use feeder::{
    DosingOutcome, FeederBuilder, FeederController, FeedingCommand, FixedCalendar, LocalCalendar,
};
pub use hw_error::map_hw_error;
pub use smoother::HeartRateSmoother;
pub use steps::StepCounter;
pub use vitals::VitalsReading;
pub use window::SampleWindow;
