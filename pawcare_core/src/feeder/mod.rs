//! Feeder: command parsing, dispensing, the waste gate and the schedule slot.
pub mod builder;
pub mod command;
pub mod controller;
pub mod dispenser;
pub mod gate;
pub mod report;
pub mod schedule;

pub use builder::FeederBuilder;
pub use command::FeedingCommand;
pub use controller::{FeederController, StatusBroadcaster};
pub use dispenser::{Dispenser, DosingOutcome};
pub use gate::{Gate, GatePosition, duty_for_angle};
pub use report::{
    Ack, DosingReport, ErrorReply, FeedingReport, Outbound, ScheduledFeeding, StatusSnapshot,
};
pub use schedule::{Calendar, FixedCalendar, LocalCalendar, Scheduler};
