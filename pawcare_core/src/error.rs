use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeederError {
    #[error("System not active. Please send 'start' first.")]
    NotActive,
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("scheduled time {0} is in the past")]
    ScheduleInPast(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing scale")]
    MissingScale,
    #[error("missing feed servo")]
    MissingServo,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
