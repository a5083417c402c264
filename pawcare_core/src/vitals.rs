//! Per-cycle vitals, plausibility bands and battery conversion.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::estimator::HeartRate;

const ADC_FULL_SCALE: f32 = 4095.0;
const ADC_REF_V: f32 = 3.3;
const BATTERY_EMPTY_V: f32 = 3.3;
const BATTERY_FULL_V: f32 = 4.2;

#[inline]
pub fn plausible_heart_rate(hr: HeartRate) -> bool {
    hr.bpm() > 40 && hr.bpm() < 200
}

#[inline]
pub fn plausible_spo2(pct: u8) -> bool {
    pct > 80 && pct <= 100
}

#[inline]
pub fn plausible_temperature(c: f32) -> bool {
    c.is_finite() && c > 20.0 && c < 45.0
}

/// Battery voltage behind a resistive divider read by a 12-bit ADC.
#[inline]
pub fn battery_voltage(raw: u16, divider: f32) -> f32 {
    f32::from(raw) * ADC_REF_V / ADC_FULL_SCALE * divider
}

/// Linear state of charge between 3.3 V (0 %) and 4.2 V (100 %), truncated.
pub fn battery_percent(voltage: f32) -> u8 {
    if voltage >= BATTERY_FULL_V {
        100
    } else if voltage <= BATTERY_EMPTY_V || !voltage.is_finite() {
        0
    } else {
        ((voltage - BATTERY_EMPTY_V) / (BATTERY_FULL_V - BATTERY_EMPTY_V) * 100.0) as u8
    }
}

/// One publish cycle's worth of vitals. Implausible values are dropped, not clamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalsReading {
    pub heart_rate_bpm: Option<u16>,
    pub spo2_pct: Option<u8>,
    pub temperature_c: Option<f32>,
    pub steps: u32,
    pub battery_pct: u8,
    pub timestamp: DateTime<Utc>,
}

impl VitalsReading {
    pub fn new(steps: u32, battery_pct: u8, timestamp: DateTime<Utc>) -> Self {
        Self {
            heart_rate_bpm: None,
            spo2_pct: None,
            temperature_c: None,
            steps,
            battery_pct,
            timestamp,
        }
    }

    /// Retain `hr` if plausible; returns whether it was kept.
    pub fn offer_heart_rate(&mut self, hr: HeartRate) -> bool {
        let ok = plausible_heart_rate(hr);
        if ok {
            self.heart_rate_bpm = Some(hr.bpm());
        }
        ok
    }

    pub fn offer_spo2(&mut self, pct: u8) -> bool {
        let ok = plausible_spo2(pct);
        if ok {
            self.spo2_pct = Some(pct);
        }
        ok
    }

    pub fn offer_temperature(&mut self, c: f32) -> bool {
        let ok = plausible_temperature(c);
        if ok {
            self.temperature_c = Some(c);
        }
        ok
    }

    pub fn has_vitals(&self) -> bool {
        self.heart_rate_bpm.is_some() || self.spo2_pct.is_some() || self.temperature_c.is_some()
    }
}
