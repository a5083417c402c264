use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use pawcare_core::bus::Publisher;
use pawcare_core::config::{FeederIdentity, ScaleCalibration};
use pawcare_core::feeder::{FeederController, FixedCalendar};
use pawcare_core::mocks::{BrokenServo, OfflineBus, RecordingBus};
use pawcare_hardware::sim::{SimBowl, SimulatedFeedServo, SimulatedRanger, SimulatedScale, SimulatedServo};
use pawcare_traits::clock::test_clock::TestClock;
use serde_json::{Value, json};

const PREFIX: &str = "pet/manager/topic";

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn topic(suffix: &str) -> String {
    format!("{PREFIX}/{suffix}")
}

struct Rig {
    feeder: FeederController,
    bus: Arc<RecordingBus>,
    bowl: SimBowl,
    calendar: FixedCalendar,
}

fn rig_with(identity: FeederIdentity, broken_feed_servo: bool) -> Rig {
    let bus = Arc::new(RecordingBus::new());
    let dyn_bus: Arc<dyn Publisher> = bus.clone();
    let bowl = SimBowl::new(0.0);
    let scale = SimulatedScale::new(bowl.clone(), 100.0);
    let calibration = ScaleCalibration {
        reference_unit: 100.0,
        zero_counts: scale.zero_counts(),
    };
    let calendar = FixedCalendar::new(t0());
    let builder = FeederController::builder(dyn_bus)
        .with_scale(scale)
        .with_calibration(calibration)
        .with_identity(identity)
        .with_gate_servo(SimulatedServo::new())
        .with_rangers(SimulatedRanger::new(120.0), SimulatedRanger::new(45.0))
        .with_distance_scale(1.1)
        .with_clock(Arc::new(TestClock::new()))
        .with_calendar(Arc::new(calendar.clone()));
    let feeder = if broken_feed_servo {
        builder.with_feed_servo(BrokenServo).build()
    } else {
        builder
            .with_feed_servo(SimulatedFeedServo::new(bowl.clone(), 2.5))
            .build()
    }
    .unwrap();
    Rig {
        feeder,
        bus,
        bowl,
        calendar,
    }
}

fn rig() -> Rig {
    rig_with(FeederIdentity::default(), false)
}

fn wait_for(bus: &RecordingBus, topic: &str, n: usize) -> Vec<Value> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let msgs = bus.on_topic(topic);
        if msgs.len() >= n || Instant::now() > deadline {
            return msgs;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn feeding_commands_need_start() {
    let r = rig();
    for (cmd, suffix) in [("feed", "feeding"), ("feed_until 10", "feed_until"), ("status", "status")] {
        let out = r.feeder.handle_raw(cmd);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, topic(suffix));
        assert_eq!(
            out[0].payload,
            json!({"status": "error", "message": "System not active. Please send 'start' first."})
        );
    }
    assert_eq!(r.bowl.grams(), 0.0);
    assert_eq!(r.bus.messages().len(), 3);
}

#[test]
fn start_and_stop_are_idempotent() {
    let r = rig();
    for _ in 0..2 {
        let out = r.feeder.handle_raw("start");
        assert_eq!(out[0].payload, json!({"status": "started"}));
        assert!(r.feeder.is_active());
    }
    for _ in 0..2 {
        let out = r.feeder.handle_raw("stop");
        assert_eq!(out[0].payload, json!({"status": "stopped"}));
        assert!(!r.feeder.is_active());
    }
}

#[test]
fn gate_works_while_idle_and_close_reports_status() {
    let r = rig();
    let out = r.feeder.handle_raw("open_gate");
    assert_eq!(out[0].topic, topic("open_gate"));
    assert_eq!(out[0].payload["status"], "gate_opened");

    let out = r.feeder.handle_raw("close_gate");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].payload["status"], "gate_closed");
    assert_eq!(out[1].topic, topic("status"));
    assert_eq!(out[1].payload["status"], "idle");
    assert_eq!(r.bus.on_topic(&topic("status")).len(), 1);
}

#[test]
fn feed_reports_estimate_and_levels() {
    let r = rig();
    r.feeder.handle_raw("start");
    let out = r.feeder.handle_raw("feed");
    let p = &out[0].payload;
    assert_eq!(out[0].topic, topic("feeding"));
    assert_eq!(p["timestamp"], "2025-05-01T12:00:00");
    assert_eq!(p["pet_id"], "feeder-pet");
    assert_eq!(p["amount"], 10.0);
    assert_eq!(p["calories"], 20.0);
    assert_eq!(p["food_type"], "default_food");
    assert!((p["power"].as_f64().unwrap() - 3.7).abs() < 1e-6);
    assert!((p["height_waste"].as_f64().unwrap() - 132.0).abs() < 1e-3);
    assert!((p["height_feed"].as_f64().unwrap() - 49.5).abs() < 1e-3);
    assert!((r.bowl.grams() - 5.0).abs() < 1e-4);
}

#[test]
fn feed_until_reaches_target() {
    let r = rig();
    r.feeder.handle_raw("start");
    let out = r.feeder.handle_raw("feed_until 18");
    let p = &out[0].payload;
    assert_eq!(p["status"], "fed_until");
    assert_eq!(p["target"], 18.0);
    assert_eq!(p["actual"], 20.0);
    assert_eq!(p["loops"], 4);
}

#[test]
fn jammed_dispenser_ends_in_safety_stop() {
    let r = rig_with(FeederIdentity::default(), true);
    r.feeder.handle_raw("start");
    let out = r.feeder.handle_raw("feed_until 5");
    assert_eq!(out[0].payload["status"], "safety_stop");
    assert_eq!(out[0].payload["loops"], 20);
    assert_eq!(out[0].payload["actual"], 0.0);
}

#[test]
fn bad_commands_are_reported() {
    let r = rig();
    let out = r.feeder.handle_raw("dance");
    assert_eq!(out[0].topic, topic("status"));
    assert_eq!(out[0].payload["message"], "Unknown command: dance");

    let out = r.feeder.handle_raw("feed_until lots");
    assert_eq!(out[0].topic, topic("feed_until"));
    assert_eq!(out[0].payload["message"], "Invalid command. Usage: feed_until 25");
}

#[test]
fn schedule_in_past_is_rejected() {
    let r = rig();
    let out = r.feeder.handle_raw("schedule_feed 2025-05-01 11:00 10");
    assert_eq!(out[0].topic, topic("schedule"));
    assert_eq!(out[0].payload["status"], "error");
    assert_eq!(
        out[0].payload["message"],
        "scheduled time 2025-05-01 11:00:00 is in the past"
    );
    assert!(r.feeder.pending_schedule().is_none());
}

#[test]
fn new_schedule_replaces_and_cancel_clears() {
    let r = rig();
    r.feeder.handle_raw("schedule_feed 2025-05-01 13:00 10");
    let out = r.feeder.handle_raw("schedule_feed 2025-05-01 14:30 25");
    assert_eq!(out[0].payload["status"], "scheduled");
    assert_eq!(out[0].payload["scheduled_feeding"]["datetime"], "2025-05-01T14:30:00");

    let pending = r.feeder.pending_schedule().unwrap();
    assert_eq!(pending.grams, 25.0);

    for _ in 0..2 {
        let out = r.feeder.handle_raw("cancel_schedule");
        assert_eq!(out[0].payload, json!({"status": "schedule_cancelled"}));
        assert!(r.feeder.pending_schedule().is_none());
    }
}

#[test]
fn status_includes_pending_schedule() {
    let r = rig();
    r.feeder.handle_raw("start");
    r.feeder.handle_raw("schedule_feed 2025-05-01 13:00 30");
    r.bowl.set(7.0);
    let out = r.feeder.handle_raw("status");
    let p = &out[0].payload;
    assert_eq!(p["status"], "active");
    assert_eq!(p["weight"], 7.0);
    assert_eq!(p["scheduled_feeding"]["grams"], 30.0);
    assert_eq!(p["scheduled_feeding"]["datetime"], "2025-05-01T13:00:00");
}

#[test]
fn scheduled_feed_fires_and_clears_slot() {
    let r = rig();
    r.feeder.handle_raw("start");
    r.feeder.handle_raw("schedule_feed 2025-05-01 12:00:01 10");
    assert!(r.feeder.pending_schedule().is_some());

    let fired = wait_for(&r.bus, &topic("feed_until"), 1);
    assert_eq!(fired.len(), 1, "scheduled feed never fired");
    assert_eq!(fired[0]["status"], "fed_until");
    assert_eq!(fired[0]["actual"], 10.0);
    assert!(r.feeder.pending_schedule().is_none());
}

#[test]
fn scheduled_feed_is_skipped_while_idle() {
    let r = rig();
    r.calendar.set(t0());
    r.feeder.handle_raw("schedule_feed 2025-05-01 12:00:01 10");
    let msgs = wait_for(&r.bus, &topic("schedule"), 2);
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[1], json!({"status": "schedule_skipped"}));
    assert_eq!(r.bowl.grams(), 0.0);
    assert!(r.feeder.pending_schedule().is_none());
}

#[test]
fn status_broadcaster_publishes_periodically() {
    let r = rig_with(
        FeederIdentity {
            status_interval_ms: 20,
            ..FeederIdentity::default()
        },
        false,
    );
    let broadcaster = r.feeder.spawn_status_broadcaster().unwrap();
    let msgs = wait_for(&r.bus, &topic("status"), 2);
    broadcaster.stop();
    assert!(msgs.len() >= 2);
    assert_eq!(msgs[0]["status"], "idle");
}

#[test]
fn unreachable_broker_does_not_block_commands() {
    let bowl = SimBowl::new(0.0);
    let feeder = FeederController::builder(Arc::new(OfflineBus))
        .with_scale(SimulatedScale::new(bowl.clone(), 1.0))
        .with_feed_servo(SimulatedFeedServo::new(bowl, 1.0))
        .with_clock(Arc::new(TestClock::new()))
        .build()
        .unwrap();
    let out = feeder.handle_raw("start");
    assert_eq!(out[0].payload["status"], "started");
    assert!(feeder.is_active());
}
