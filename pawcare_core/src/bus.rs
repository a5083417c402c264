//! Message bus seam.
//!
//! Devices publish JSON payloads on string topics and never wait for an
//! acknowledgment. A failed publish is logged and dropped; the next periodic
//! publish carries fresh state.
use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;

pub type BusError = Box<dyn std::error::Error + Send + Sync>;

pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;
}

impl<T: Publisher + ?Sized> Publisher for std::sync::Arc<T> {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        (**self).publish(topic, payload)
    }
}

/// Serialize `payload` and publish it. Returns whether the message left the process.
pub fn publish_json<T: Serialize + ?Sized>(bus: &dyn Publisher, topic: &str, payload: &T) -> bool {
    let body = match serde_json::to_string(payload) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(topic, error = %e, "failed to serialize payload");
            return false;
        }
    };
    match bus.publish(topic, &body) {
        Ok(()) => {
            tracing::debug!(topic, bytes = body.len(), "published");
            true
        }
        Err(e) => {
            tracing::warn!(topic, error = %e, "publish failed, dropping message");
            false
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    payload: serde_json::Value,
}

/// Writes every message as one JSON line `{"topic": ..., "payload": ...}`.
pub struct JsonLinesBus<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesBus<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.out.into_inner().ok()
    }
}

impl<W: Write + Send> Publisher for JsonLinesBus<W> {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        let payload = serde_json::from_str(payload)
            .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));
        let line = serde_json::to_string(&Envelope { topic, payload })?;
        let mut out = self.out.lock().map_err(|_| "bus writer poisoned")?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
