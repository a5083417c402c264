//! Single-slot scheduled feed.
//!
//! At most one feed is pending. Each schedule gets its own timer thread that
//! waits on either the fire time or its cancel channel; replacing or
//! cancelling drops the sender, which wakes the thread and lets it exit.
//! A fired timer only runs its callback if its id still owns the slot.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use crossbeam_channel as xch;

use crate::error::FeederError;
use crate::feeder::report::ScheduledFeeding;

/// Wall-clock source for schedule times and report timestamps.
pub trait Calendar: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local time of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCalendar;

impl Calendar for LocalCalendar {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Calendar that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FixedCalendar {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl FixedCalendar {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Calendar for FixedCalendar {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Pending {
    id: u64,
    fire_at: NaiveDateTime,
    grams: f32,
    // Dropping this wakes the timer thread.
    _cancel: xch::Sender<()>,
}

pub struct Scheduler {
    slot: Arc<Mutex<Option<Pending>>>,
    next_id: AtomicU64,
    calendar: Arc<dyn Calendar>,
}

impl Scheduler {
    pub fn new(calendar: Arc<dyn Calendar>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
            calendar,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.calendar.now()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The pending feed, if any.
    pub fn pending(&self) -> Option<ScheduledFeeding> {
        self.lock().as_ref().map(|p| ScheduledFeeding {
            datetime: p.fire_at,
            grams: p.grams,
        })
    }

    /// Install a feed at `fire_at`, replacing any pending one. `on_fire` runs on
    /// the timer thread with the scheduled grams.
    pub fn schedule<F>(&self, fire_at: NaiveDateTime, grams: f32, on_fire: F) -> Result<(), FeederError>
    where
        F: FnOnce(f32) + Send + 'static,
    {
        let now = self.calendar.now();
        if fire_at <= now {
            return Err(FeederError::ScheduleInPast(
                fire_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ));
        }
        let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = xch::bounded::<()>(1);

        let mut slot = self.lock();
        if let Some(prev) = slot.replace(Pending {
            id,
            fire_at,
            grams,
            _cancel: cancel_tx,
        }) {
            tracing::info!(replaced = %prev.fire_at, "replacing pending scheduled feed");
        }
        drop(slot);

        let slot = Arc::clone(&self.slot);
        let spawned = std::thread::Builder::new()
            .name(format!("feed-schedule-{id}"))
            .spawn(move || {
                xch::select! {
                    recv(cancel_rx) -> _ => {
                        tracing::debug!(id, "scheduled feed timer cancelled");
                    }
                    recv(xch::after(delay)) -> _ => {
                        let fired = {
                            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                            match slot.as_ref() {
                                Some(p) if p.id == id => slot.take(),
                                _ => None,
                            }
                        };
                        if let Some(p) = fired {
                            tracing::info!(id, grams = p.grams, "scheduled feed firing");
                            on_fire(p.grams);
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            let mut slot = self.lock();
            if slot.as_ref().is_some_and(|p| p.id == id) {
                *slot = None;
            }
            return Err(FeederError::Scheduler(format!("failed to start timer: {e}")));
        }
        tracing::info!(id, %fire_at, grams, delay_ms = delay.as_millis() as u64, "feed scheduled");
        Ok(())
    }

    /// Cancel the pending feed. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(p) => {
                tracing::info!(fire_at = %p.fire_at, "scheduled feed cancelled");
                true
            }
            None => false,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn scheduler() -> (Scheduler, FixedCalendar) {
        let cal = FixedCalendar::new(t0());
        (Scheduler::new(Arc::new(cal.clone())), cal)
    }

    #[test]
    fn rejects_past_and_present() {
        let (s, _) = scheduler();
        assert!(matches!(
            s.schedule(t0(), 5.0, |_| {}),
            Err(FeederError::ScheduleInPast(_))
        ));
        assert!(s.schedule(t0() - chrono::Duration::hours(1), 5.0, |_| {}).is_err());
        assert!(s.pending().is_none());
    }

    #[test]
    fn second_schedule_replaces_first() {
        let (s, _) = scheduler();
        let (tx, rx) = xch::unbounded();
        let tx2 = tx.clone();
        s.schedule(t0() + chrono::Duration::hours(1), 10.0, move |g| {
            let _ = tx.send(g);
        })
        .unwrap();
        s.schedule(t0() + chrono::Duration::milliseconds(50), 20.0, move |g| {
            let _ = tx2.send(g);
        })
        .unwrap();
        assert_eq!(s.pending().unwrap().grams, 20.0);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 20.0);
        // Firing clears the slot and the replaced feed never runs.
        assert!(s.pending().is_none());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn cancel_is_idempotent_and_prevents_firing() {
        let (s, _) = scheduler();
        let (tx, rx) = xch::unbounded();
        s.schedule(t0() + chrono::Duration::milliseconds(80), 5.0, move |g| {
            let _ = tx.send(g);
        })
        .unwrap();
        assert!(s.cancel());
        assert!(!s.cancel());
        assert!(s.pending().is_none());
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn fixed_calendar_moves_on_request() {
        let cal = FixedCalendar::new(t0());
        cal.advance(chrono::Duration::minutes(5));
        assert_eq!(cal.now(), t0() + chrono::Duration::minutes(5));
        cal.set(t0());
        assert_eq!(cal.now(), t0());
    }
}
