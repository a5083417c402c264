//! Test and helper mocks for pawcare_core.
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::bus::{BusError, Publisher};

/// Publisher that keeps every message in memory.
#[derive(Default)]
pub struct RecordingBus {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(topic, payload)` pairs published so far.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Parsed payloads published on `topic`, in order.
    pub fn on_topic(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| serde_json::from_str(&p).ok())
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.messages.lock() {
            m.clear();
        }
    }
}

impl Publisher for RecordingBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        self.messages
            .lock()
            .map_err(|_| "recording bus poisoned")?
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Publisher whose broker is always unreachable.
pub struct OfflineBus;

impl Publisher for OfflineBus {
    fn publish(&self, _topic: &str, _payload: &str) -> Result<(), BusError> {
        Err(Box::new(std::io::Error::other("broker unreachable")))
    }
}

/// Scale returning a scripted sequence of raw readings, repeating the last one.
/// `None` entries fail the read.
pub struct ScriptedScale {
    script: VecDeque<Option<i32>>,
    last: Option<i32>,
}

impl ScriptedScale {
    pub fn new(script: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
        }
    }
}

impl pawcare_traits::Scale for ScriptedScale {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let next = match self.script.pop_front() {
            Some(v) => {
                self.last = v;
                v
            }
            None => self.last,
        };
        next.ok_or_else(|| "scripted read failure".into())
    }
}

/// Servo that rejects every command.
pub struct BrokenServo;

impl pawcare_traits::Servo for BrokenServo {
    fn set_duty(&mut self, _duty_pct: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("pwm channel busy")))
    }
}
