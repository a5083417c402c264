use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pawcare_core::bus::Publisher;
use pawcare_core::collar::{CollarMode, CollarMonitor};
use pawcare_core::config::{CollarCfg, EstimatorCfg, SmootherCfg, StepCfg};
use pawcare_core::mocks::RecordingBus;
use pawcare_hardware::sim::{SimulatedBattery, SimulatedImu, SimulatedPpg};
use pawcare_traits::clock::test_clock::TestClock;

type SimCollar = CollarMonitor<SimulatedPpg, SimulatedImu, SimulatedBattery>;

fn collar(cfg: CollarCfg, ppg: SimulatedPpg, imu: SimulatedImu) -> (SimCollar, Arc<RecordingBus>, TestClock) {
    let clock = TestClock::new();
    let bus = Arc::new(RecordingBus::new());
    let dyn_bus: Arc<dyn Publisher> = bus.clone();
    let monitor = CollarMonitor::new(
        cfg,
        EstimatorCfg::default(),
        &SmootherCfg::default(),
        StepCfg::default(),
        (ppg, imu, SimulatedBattery::default()),
        Arc::new(clock.clone()),
        dyn_bus,
    );
    (monitor, bus, clock)
}

#[test]
fn battery_is_reported_on_first_tick() {
    let cfg = CollarCfg::default();
    let battery_topic = cfg.battery_topic.clone();
    let (mut m, bus, _clock) = collar(cfg, SimulatedPpg::new(50, 150.0), SimulatedImu::new(50, 100));
    let summary = m.tick();
    assert!(summary.sample_accepted);
    assert!(summary.published_battery);
    let msgs = bus.on_topic(&battery_topic);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["device_id"], "collar-01");
    assert_eq!(msgs[0]["battery_percent"], 66);
    assert_eq!(msgs[0]["status"], "normal");
}

#[test]
fn publishes_plausible_vitals_and_steps() {
    let cfg = CollarCfg::default();
    let health_topic = cfg.health_topic.clone();
    let (mut m, bus, _clock) = collar(cfg, SimulatedPpg::new(50, 150.0), SimulatedImu::new(50, 100));
    let shutdown = AtomicBool::new(false);

    let ticks = m.run(&shutdown, Some(300));
    assert_eq!(ticks, 300);
    assert_eq!(m.mode(), CollarMode::Active);

    let health = bus.on_topic(&health_topic);
    assert_eq!(health.len(), 1, "one publish in 6 simulated seconds");
    let p = &health[0];
    assert_eq!(p["pet_id"], "collar-pet");
    assert_eq!(p["temperature"], 38.5);
    let bpm = p["heart_rate"].as_u64().unwrap();
    assert!((140..=160).contains(&bpm), "bpm {bpm}");
    let spo2 = p["oxygen_level"].as_f64().unwrap();
    assert!(spo2 > 80.0 && spo2 <= 100.0, "spo2 {spo2}");
    assert!(p["steps_value"].as_u64().unwrap() >= 7);
    assert_eq!(p["power"], 66);
}

#[test]
fn lost_contact_clears_window() {
    let ppg = SimulatedPpg::new(50, 150.0);
    let contact = ppg.contact_handle();
    let (mut m, _bus, clock) = collar(CollarCfg::default(), ppg, SimulatedImu::new(50, 100));

    for _ in 0..40 {
        m.tick();
        clock.advance_ms(20);
    }
    assert_eq!(m.window_len(), 40);

    contact.store(false, Ordering::Relaxed);
    let summary = m.tick();
    assert!(summary.contact_lost);
    assert_eq!(m.window_len(), 0);

    // A second no-contact sample on an empty window is not another loss.
    clock.advance_ms(20);
    assert!(!m.tick().contact_lost);
}

#[test]
fn standby_after_timeout_and_wake_on_contact() {
    let cfg = CollarCfg {
        standby_timeout_ms: 1_000,
        standby_check_interval_ms: 200,
        ..CollarCfg::default()
    };
    let ppg = SimulatedPpg::new(50, 150.0);
    let contact = ppg.contact_handle();
    contact.store(false, Ordering::Relaxed);
    // One step every 10 minutes keeps the accelerometer quiet.
    let (mut m, _bus, clock) = collar(cfg, ppg, SimulatedImu::new(50, 0));

    for _ in 0..60 {
        m.tick();
        clock.advance_ms(20);
    }
    assert_eq!(m.mode(), CollarMode::Standby);

    contact.store(true, Ordering::Relaxed);
    clock.advance_ms(200);
    m.tick();
    assert_eq!(m.mode(), CollarMode::Active);
    assert_eq!(m.window_len(), 0);
}

struct DeadAdc;

impl pawcare_traits::BatteryGauge for DeadAdc {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Err("adc did not acknowledge".into())
    }
}

#[test]
fn failed_battery_read_publishes_nothing() {
    let cfg = CollarCfg::default();
    let battery_topic = cfg.battery_topic.clone();
    let clock = TestClock::new();
    let bus = Arc::new(RecordingBus::new());
    let dyn_bus: Arc<dyn Publisher> = bus.clone();
    let mut m = CollarMonitor::new(
        cfg,
        EstimatorCfg::default(),
        &SmootherCfg::default(),
        StepCfg::default(),
        (SimulatedPpg::new(50, 150.0), SimulatedImu::new(50, 100), DeadAdc),
        Arc::new(clock.clone()),
        dyn_bus,
    );
    let summary = m.tick();
    assert!(summary.sample_accepted);
    assert!(!summary.published_battery);
    assert!(bus.on_topic(&battery_topic).is_empty());
}
