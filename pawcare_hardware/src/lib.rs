//! Device drivers for the pet-care collar and feeder.
//!
//! `sim` and `replay` are always available; the Raspberry Pi drivers in
//! `hardware` need the `hardware` feature.
pub mod error;
pub mod replay;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hardware;
#[cfg(feature = "hardware")]
pub mod hx711;

pub use replay::{ReplayImu, ReplayPpg};
pub use sim::{
    SimBowl, SimulatedBattery, SimulatedFeedServo, SimulatedImu, SimulatedPpg, SimulatedRanger,
    SimulatedScale, SimulatedServo,
};
