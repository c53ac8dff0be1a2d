//! Aggregation of dish readings into cumulative counters and gauges.
//!
//! The [`StatsAggregator`] is the only shared mutable state in the monitor. It has two writers:
//!
//! - the poller, which calls [`StatsAggregator::ingest`] once per poll cycle
//! - the `/metrics` handler, which calls [`StatsAggregator::record_scrape`] once per request
//!
//! Both go through the same mutex and every update is applied inside one critical section, so a
//! reader can never observe a half-applied reading.
//!
//! ```text
//!   Poller                            HTTP handlers
//!   ──────                            ─────────────
//!     │ poll() (no lock held)              │
//!     │                                    │
//!     └──── ingest() ──┐      ┌── record_scrape() / snapshot()
//!                      │      │
//!              ┌───────▼──────▼───────┐
//!              │  Mutex<AggregateState>│
//!              └──────────────────────┘
//! ```

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crate::sample::{DishStatus, PollOutcome, SampleReading};

/// Edge detector for drop events.
///
/// Only valid readings move it; a streak of failed polls leaves it where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropState {
    #[default]
    NotDropping,
    Dropping,
}

/// Point-in-time copy of the aggregate state.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    /// Drop rate of the most recent valid reading.
    pub current_drop_rate: f64,
    /// Highest drop rate seen since start.
    pub peak_drop_rate: f64,
    /// Time attributed to readings with packet loss.
    pub total_drop_seconds: f64,
    pub drop_events_total: u64,
    pub samples_total: u64,
    pub errors_total: u64,
    pub scrapes_total: u64,
    /// Wall-clock capture time of the most recent valid reading.
    pub last_update: Option<SystemTime>,
    pub started_at: Instant,
    /// Extended status from the most recent valid reading that carried one.
    pub dish_status: Option<DishStatus>,
}

impl AggregateSnapshot {
    /// Time since the aggregator was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Unix timestamp of the last valid reading, in seconds.
    pub fn last_update_unix_secs(&self) -> Option<f64> {
        self.last_update.map(|ts| {
            ts.duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64()
        })
    }
}

#[derive(Debug)]
struct AggregateState {
    current_drop_rate: f64,
    peak_drop_rate: f64,
    total_drop_seconds: f64,
    drop_events_total: u64,
    samples_total: u64,
    errors_total: u64,
    scrapes_total: u64,
    last_update: Option<SystemTime>,
    last_observed_at: Option<Instant>,
    started_at: Instant,
    drop_state: DropState,
    dish_status: Option<DishStatus>,
}

impl AggregateState {
    fn new(started_at: Instant) -> Self {
        Self {
            current_drop_rate: 0.0,
            peak_drop_rate: 0.0,
            total_drop_seconds: 0.0,
            drop_events_total: 0,
            samples_total: 0,
            errors_total: 0,
            scrapes_total: 0,
            last_update: None,
            last_observed_at: None,
            started_at,
            drop_state: DropState::NotDropping,
            dish_status: None,
        }
    }

    fn apply(&mut self, reading: SampleReading, poll_interval: Duration) {
        // The first reading has nothing to measure against, so it is credited with the nominal
        // poll interval. After an error streak the whole gap since the previous valid reading is
        // attributed to this one.
        let elapsed = match self.last_observed_at {
            Some(prev) => reading.observed_at.saturating_duration_since(prev),
            None => poll_interval,
        };

        self.current_drop_rate = reading.drop_rate;
        if reading.drop_rate > self.peak_drop_rate {
            self.peak_drop_rate = reading.drop_rate;
        }

        if reading.drop_rate > 0.0 {
            self.total_drop_seconds += elapsed.as_secs_f64();
            if self.drop_state == DropState::NotDropping {
                self.drop_events_total += 1;
                self.drop_state = DropState::Dropping;
            }
        } else {
            self.drop_state = DropState::NotDropping;
        }

        self.samples_total += reading.effective_sample_count();
        self.last_update = Some(reading.wall_time);
        self.last_observed_at = Some(reading.observed_at);
        if reading.status.is_some() {
            self.dish_status = reading.status;
        }
    }

    fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            current_drop_rate: self.current_drop_rate,
            peak_drop_rate: self.peak_drop_rate,
            total_drop_seconds: self.total_drop_seconds,
            drop_events_total: self.drop_events_total,
            samples_total: self.samples_total,
            errors_total: self.errors_total,
            scrapes_total: self.scrapes_total,
            last_update: self.last_update,
            started_at: self.started_at,
            dish_status: self.dish_status.clone(),
        }
    }
}

/// Owns all cumulative state derived from dish readings.
#[derive(Debug)]
pub struct StatsAggregator {
    state: Mutex<AggregateState>,
    poll_interval: Duration,
}

impl StatsAggregator {
    /// Creates an aggregator with every counter at zero.
    ///
    /// `poll_interval` is the elapsed time credited to the first valid reading.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(AggregateState::new(Instant::now())),
            poll_interval,
        }
    }

    // Critical sections never panic midway, so a poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Folds the outcome of one poll cycle into the state. Never fails.
    pub fn ingest(&self, outcome: PollOutcome) {
        let mut state = self.lock();
        match outcome {
            PollOutcome::Failed => state.errors_total += 1,
            PollOutcome::Reading(reading) => state.apply(reading, self.poll_interval),
        }
    }

    /// Returns a copy of the current state without modifying it.
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.lock().snapshot()
    }

    /// Counts one `/metrics` request and returns the state it should render.
    ///
    /// The increment and the copy happen under the same lock, so the returned snapshot already
    /// includes this scrape.
    pub fn record_scrape(&self) -> AggregateSnapshot {
        let mut state = self.lock();
        state.scrapes_total += 1;
        state.snapshot()
    }
}
