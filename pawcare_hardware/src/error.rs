use thiserror::Error;

/// Driver failures. Bus errors carry the underlying `rppal` message as text.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("servo pwm error: {0}")]
    Pwm(String),
    #[error("i2c error: {0}")]
    I2c(String),
    /// A conversion did not complete within the read timeout.
    #[error("scale timeout")]
    Timeout,
    #[error("hx711 data-ready timeout")]
    DataReadyTimeout,
    /// The ranger finished a measurement but flagged it invalid.
    #[error("ranging status {0}")]
    RangeStatus(u8),
}

pub type Result<T> = std::result::Result<T, HwError>;
