//! Maps `Box<dyn Error>` from trait boundaries to typed `FeederError`.
//!
//! The traits in `pawcare_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `pawcare_hardware::HwError` downcasting.

use crate::error::FeederError;

/// Map a trait-boundary error to a typed `FeederError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FeederError {
    #[cfg(feature = "hardware-errors")]
    {
        use pawcare_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => FeederError::Timeout,
                other => FeederError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FeederError::Timeout
    } else {
        FeederError::Hardware(s)
    }
}
