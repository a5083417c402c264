//! JSON payloads published by the feeder.
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::FeederError;

/// Result of an open-loop `feed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedingReport {
    pub timestamp: NaiveDateTime,
    pub pet_id: String,
    pub amount: f32,
    pub height_waste: Option<f32>,
    pub height_feed: Option<f32>,
    pub power: f32,
    pub food_type: String,
    pub calories: f32,
}

/// Result of a closed-loop `feed_until` or a fired schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DosingReport {
    pub status: &'static str,
    pub target: f32,
    pub actual: f32,
    pub loops: u32,
    pub height_feed: Option<f32>,
    pub height_waste: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledFeeding {
    pub datetime: NaiveDateTime,
    pub grams: f32,
}

/// Read-only feeder state, published on request and periodically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: NaiveDateTime,
    pub status: &'static str,
    pub weight: f32,
    pub height_waste: Option<f32>,
    pub height_feed: Option<f32>,
    pub scheduled_feeding: Option<ScheduledFeeding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_feeding: Option<ScheduledFeeding>,
}

impl Ack {
    pub fn new(status: &'static str) -> Self {
        Self {
            status,
            scheduled_feeding: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub status: &'static str,
    pub message: String,
}

impl From<&FeederError> for ErrorReply {
    fn from(e: &FeederError) -> Self {
        let message = match e {
            FeederError::InvalidCommand(m) => m.clone(),
            other => other.to_string(),
        };
        Self {
            status: "error",
            message,
        }
    }
}

/// One message ready for the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Outbound {
    /// Serializes `payload`; a serialization failure becomes an error reply on the same topic.
    pub fn new<T: Serialize>(topic: impl Into<String>, payload: &T) -> Self {
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize feeder payload");
            serde_json::json!({ "status": "error", "message": e.to_string() })
        });
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn status_snapshot_shape() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let snap = StatusSnapshot {
            timestamp: at,
            status: "active",
            weight: 12.5,
            height_waste: Some(80.0),
            height_feed: None,
            scheduled_feeding: Some(ScheduledFeeding {
                datetime: at,
                grams: 30.0,
            }),
        };
        let v = Outbound::new("t", &snap).payload;
        assert_eq!(v["timestamp"], "2025-03-01T08:00:00");
        assert_eq!(v["height_feed"], serde_json::Value::Null);
        assert_eq!(v["scheduled_feeding"]["grams"], 30.0);
    }

    #[test]
    fn error_reply_keeps_usage_text() {
        let reply = ErrorReply::from(&FeederError::InvalidCommand(
            "Invalid command. Usage: feed_until 25".into(),
        ));
        assert_eq!(reply.message, "Invalid command. Usage: feed_until 25");
        let reply = ErrorReply::from(&FeederError::NotActive);
        assert_eq!(reply.message, "System not active. Please send 'start' first.");
        let v = serde_json::to_value(Ack::new("started")).unwrap();
        assert_eq!(v, serde_json::json!({"status": "started"}));
    }
}
