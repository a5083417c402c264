//! Feeder command dispatch.
//!
//! All actuator and sensor access goes through one `Mutex<Devices>`, so a
//! scheduled feed firing on its timer thread never interleaves servo commands
//! with a dose triggered from the command channel.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crossbeam_channel as xch;
use pawcare_traits::{DistanceSensor, Scale, Servo};

use crate::bus::{Publisher, publish_json};
use crate::config::FeederIdentity;
use crate::error::FeederError;
use crate::feeder::command::FeedingCommand;
use crate::feeder::dispenser::{Dispenser, DosingOutcome};
use crate::feeder::gate::Gate;
use crate::feeder::report::{
    Ack, DosingReport, ErrorReply, FeedingReport, Outbound, ScheduledFeeding, StatusSnapshot,
};
use crate::feeder::schedule::Scheduler;
use crate::hw_error::map_hw_error;
use crate::util::round1;

pub type BoxedDispenser = Dispenser<Box<dyn Scale + Send>, Box<dyn Servo + Send>>;
pub type BoxedGate = Gate<Box<dyn Servo + Send>>;
pub type BoxedRanger = Box<dyn DistanceSensor + Send>;

pub(crate) struct Devices {
    pub(crate) dispenser: BoxedDispenser,
    pub(crate) gate: Option<BoxedGate>,
    /// Ranger over the waste tray.
    pub(crate) waste: Option<BoxedRanger>,
    /// Ranger over the food hopper.
    pub(crate) feed_level: Option<BoxedRanger>,
    pub(crate) distance_scale: f32,
}

fn read_distance(sensor: Option<&mut BoxedRanger>, scale: f32, which: &'static str) -> Option<f32> {
    let sensor = sensor?;
    match sensor.read_mm() {
        Ok(mm) if mm.is_finite() => Some(round1(mm * scale)),
        Ok(mm) => {
            tracing::warn!(sensor = which, mm, "discarding non-finite distance");
            None
        }
        Err(e) => {
            let err = map_hw_error(&*e);
            tracing::warn!(sensor = which, error = %err, "distance read failed");
            None
        }
    }
}

impl Devices {
    /// `(height_waste, height_feed)` in millimetres after calibration.
    fn heights(&mut self) -> (Option<f32>, Option<f32>) {
        let scale = self.distance_scale;
        (
            read_distance(self.waste.as_mut(), scale, "waste"),
            read_distance(self.feed_level.as_mut(), scale, "feed"),
        )
    }
}

pub(crate) struct Shared {
    pub(crate) devices: Mutex<Devices>,
    pub(crate) active: AtomicBool,
    pub(crate) scheduler: Scheduler,
    pub(crate) bus: Arc<dyn Publisher>,
    pub(crate) identity: FeederIdentity,
}

impl Shared {
    fn devices(&self) -> MutexGuard<'_, Devices> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.identity.topic_prefix)
    }

    fn publish(&self, msgs: &[Outbound]) {
        for m in msgs {
            publish_json(self.bus.as_ref(), &m.topic, &m.payload);
        }
    }

    fn status_label(&self) -> &'static str {
        if self.active.load(Ordering::SeqCst) {
            "active"
        } else {
            "idle"
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        let mut dev = self.devices();
        let weight = dev.dispenser.filtered_weight();
        let (height_waste, height_feed) = dev.heights();
        drop(dev);
        StatusSnapshot {
            timestamp: self.scheduler.now(),
            status: self.status_label(),
            weight,
            height_waste,
            height_feed,
            scheduled_feeding: self.scheduler.pending(),
        }
    }

    fn dose(&self, target_g: f32) -> DosingReport {
        let mut dev = self.devices();
        let outcome = dev.dispenser.feed_until_target(target_g);
        let (height_waste, height_feed) = dev.heights();
        drop(dev);
        if let DosingOutcome::SafetyStop { actual, loops } = outcome {
            tracing::warn!(target_g, actual_g = actual, loops, "dose ended on safety stop");
        }
        DosingReport {
            status: outcome.status(),
            target: target_g,
            actual: outcome.actual(),
            loops: outcome.loops(),
            height_feed,
            height_waste,
        }
    }

    fn feed_once(&self) -> FeedingReport {
        let mut dev = self.devices();
        let amount = dev.dispenser.feed_once();
        let (height_waste, height_feed) = dev.heights();
        drop(dev);
        FeedingReport {
            timestamp: self.scheduler.now(),
            pet_id: self.identity.pet_id.clone(),
            amount,
            height_waste,
            height_feed,
            power: self.identity.power,
            food_type: self.identity.food_type.clone(),
            calories: round1(amount * self.identity.calories_per_gram),
        }
    }

    /// Timer-thread entry for a fired schedule.
    fn run_scheduled(&self, grams: f32) {
        let msg = if self.active.load(Ordering::SeqCst) {
            Outbound::new(self.topic("feed_until"), &self.dose(grams))
        } else {
            tracing::warn!(grams, "scheduled feed fired while idle, skipping");
            Outbound::new(self.topic("schedule"), &Ack::new("schedule_skipped"))
        };
        self.publish(std::slice::from_ref(&msg));
    }

    fn error(&self, suffix: &str, e: &FeederError) -> Outbound {
        tracing::warn!(topic = suffix, error = %e, "command rejected");
        Outbound::new(self.topic(suffix), &ErrorReply::from(e))
    }

    fn dispatch(self: &Arc<Self>, cmd: &FeedingCommand) -> Vec<Outbound> {
        let suffix = cmd.response_suffix();
        if cmd.requires_active() && !self.active.load(Ordering::SeqCst) {
            return vec![self.error(suffix, &FeederError::NotActive)];
        }
        tracing::debug!(command = %cmd, "dispatching feeder command");

        match *cmd {
            FeedingCommand::Start => {
                if !self.active.swap(true, Ordering::SeqCst) {
                    tracing::info!("feeder started");
                }
                vec![Outbound::new(self.topic(suffix), &Ack::new("started"))]
            }
            FeedingCommand::Stop => {
                if self.active.swap(false, Ordering::SeqCst) {
                    tracing::info!("feeder stopped");
                }
                vec![Outbound::new(self.topic(suffix), &Ack::new("stopped"))]
            }
            FeedingCommand::Status => vec![Outbound::new(self.topic(suffix), &self.snapshot())],
            FeedingCommand::Once => vec![Outbound::new(self.topic(suffix), &self.feed_once())],
            FeedingCommand::UntilTarget(grams) => {
                vec![Outbound::new(self.topic(suffix), &self.dose(grams))]
            }
            FeedingCommand::OpenGate | FeedingCommand::CloseGate => self.move_gate(cmd),
            FeedingCommand::Schedule(at, grams) => {
                let weak: Weak<Self> = Arc::downgrade(self);
                let result = self.scheduler.schedule(at, grams, move |g| {
                    if let Some(shared) = weak.upgrade() {
                        shared.run_scheduled(g);
                    }
                });
                match result {
                    Ok(()) => vec![Outbound::new(
                        self.topic(suffix),
                        &Ack {
                            status: "scheduled",
                            scheduled_feeding: Some(ScheduledFeeding {
                                datetime: at,
                                grams,
                            }),
                        },
                    )],
                    Err(e) => vec![self.error(suffix, &e)],
                }
            }
            FeedingCommand::Cancel => {
                self.scheduler.cancel();
                vec![Outbound::new(self.topic(suffix), &Ack::new("schedule_cancelled"))]
            }
        }
    }

    fn move_gate(&self, cmd: &FeedingCommand) -> Vec<Outbound> {
        let suffix = cmd.response_suffix();
        let closing = matches!(cmd, FeedingCommand::CloseGate);
        let moved = match self.devices().gate.as_mut() {
            Some(gate) => {
                if closing {
                    gate.close();
                } else {
                    gate.open();
                }
                true
            }
            None => false,
        };
        if !moved {
            return vec![self.error(
                suffix,
                &FeederError::Config("gate servo not configured".into()),
            )];
        }
        let ack = if closing { "gate_closed" } else { "gate_opened" };
        let mut out = vec![Outbound::new(self.topic(suffix), &Ack::new(ack))];
        if closing {
            out.push(Outbound::new(self.topic("status"), &self.snapshot()));
        }
        out
    }
}

/// Handle to a running feeder. Dropping it cancels any pending schedule.
pub struct FeederController {
    pub(crate) shared: Arc<Shared>,
}

impl FeederController {
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn pending_schedule(&self) -> Option<ScheduledFeeding> {
        self.shared.scheduler.pending()
    }

    /// Full topic for a response suffix, e.g. `pet/manager/topic/feeding`.
    pub fn topic(&self, suffix: &str) -> String {
        self.shared.topic(suffix)
    }

    /// Execute one command and return the responses without publishing them.
    pub fn dispatch(&self, cmd: &FeedingCommand) -> Vec<Outbound> {
        self.shared.dispatch(cmd)
    }

    /// Parse, execute and publish one plaintext command.
    pub fn handle_raw(&self, text: &str) -> Vec<Outbound> {
        let out = match text.parse::<FeedingCommand>() {
            Ok(cmd) => self.dispatch(&cmd),
            Err(e) => {
                let suffix = match text.split_whitespace().next() {
                    Some("feed_until") => "feed_until",
                    Some("schedule_feed") => "schedule",
                    _ => "status",
                };
                vec![self.shared.error(suffix, &e)]
            }
        };
        self.shared.publish(&out);
        out
    }

    /// Current state without publishing. Reads the scale and both rangers.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.shared.snapshot()
    }

    /// Publish the status snapshot every `status_interval_ms` until stopped.
    pub fn spawn_status_broadcaster(&self) -> Result<StatusBroadcaster, FeederError> {
        let weak = Arc::downgrade(&self.shared);
        let interval = Duration::from_millis(self.shared.identity.status_interval_ms.max(1));
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let join_handle = std::thread::Builder::new()
            .name("feeder-status".into())
            .spawn(move || {
                loop {
                    xch::select! {
                        recv(stop_rx) -> _ => break,
                        recv(xch::after(interval)) -> _ => {
                            let Some(shared) = weak.upgrade() else { break };
                            let snap = shared.snapshot();
                            publish_json(shared.bus.as_ref(), &shared.topic("status"), &snap);
                        }
                    }
                }
                tracing::trace!("status broadcaster exiting");
            })
            .map_err(|e| FeederError::Scheduler(format!("failed to start status broadcaster: {e}")))?;
        Ok(StatusBroadcaster {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        })
    }
}

impl Drop for FeederController {
    fn drop(&mut self) {
        if self.shared.scheduler.cancel() {
            tracing::debug!("pending schedule cancelled on shutdown");
        }
        self.shared.devices().dispenser.release();
    }
}

/// Background status publisher; stops and joins on drop.
pub struct StatusBroadcaster {
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl StatusBroadcaster {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "status broadcaster panicked");
            }
        }
    }
}

impl Drop for StatusBroadcaster {
    fn drop(&mut self) {
        self.shutdown();
    }
}
