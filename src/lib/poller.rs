//! Background poll loop feeding the aggregator.
//!
//! One [`Poller`] runs per process. It calls the dish sequentially, so two poll cycles never
//! overlap, and sleeps for the configured interval after each cycle. A slow poll therefore
//! delays the next one instead of being skipped or doubled up.

use std::{future::Future, sync::Arc, time::Duration, time::SystemTime};

use tracing::{debug, error, info, warn};

use crate::{
    aggregator::StatsAggregator,
    dish::DishClient,
    sample::{PollOutcome, SampleReading},
};

/// Lifecycle of the poll loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    Stopped,
}

/// Drives the poll cadence and feeds every outcome into the aggregator.
pub struct Poller<C> {
    client: C,
    aggregator: Arc<StatsAggregator>,
    poll_interval: Duration,
    alert_threshold: f64,
    state: PollerState,
}

impl<C: DishClient> Poller<C> {
    pub fn new(
        client: C,
        aggregator: Arc<StatsAggregator>,
        poll_interval: Duration,
        alert_threshold: f64,
    ) -> Self {
        Self {
            client,
            aggregator,
            poll_interval,
            alert_threshold,
            state: PollerState::Running,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Runs one poll cycle: one transport call and its ingestion.
    ///
    /// Transport failures are logged and counted, never returned.
    pub async fn poll_once(&mut self) {
        match self.client.poll().await {
            Ok(sample) => {
                let reading = SampleReading::from_sample(
                    sample,
                    tokio::time::Instant::now().into_std(),
                    SystemTime::now(),
                );

                if reading.drop_rate > self.alert_threshold {
                    warn!(
                        "ALERT: High ping drop detected: {:.2}% (threshold: {:.1}%)",
                        reading.drop_rate * 100.0,
                        self.alert_threshold * 100.0
                    );
                }
                debug!(
                    "Updated metrics: current_drop={:.2}%, new_samples={}",
                    reading.drop_rate * 100.0,
                    reading.effective_sample_count()
                );

                self.aggregator.ingest(PollOutcome::Reading(reading));
            }
            Err(e) => {
                error!("Error polling dish at {}: {}", self.client.target(), e);
                self.aggregator.ingest(PollOutcome::Failed);
            }
        }
    }

    /// Polls until `shutdown_signal` completes, then moves to [`PollerState::Stopped`].
    ///
    /// A cycle in flight when the signal fires is abandoned; its outcome is never ingested.
    pub async fn run(mut self, shutdown_signal: impl Future<Output = ()>) -> Self {
        info!("Starting monitoring loop for {}", self.client.target());
        info!(
            "Poll interval: {:?}, Alert threshold: {}%",
            self.poll_interval,
            self.alert_threshold * 100.0
        );

        tokio::pin!(shutdown_signal);

        while self.state == PollerState::Running {
            let poll_interval = self.poll_interval;
            let cycle = async {
                self.poll_once().await;
                tokio::time::sleep(poll_interval).await;
            };

            tokio::select! {
                biased;
                _ = &mut shutdown_signal => break,
                _ = cycle => {}
            }
        }

        self.state = PollerState::Stopped;
        info!("Monitoring loop stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::TransportError, sample::DishSample};
    use async_trait::async_trait;
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicU64, Ordering},
    };

    /// Replays a fixed list of outcomes, then keeps reporting a healthy link.
    struct ScriptedClient {
        script: VecDeque<Option<DishSample>>,
        delay: Duration,
        started: Arc<AtomicU64>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Option<DishSample>>) -> Self {
            Self {
                script: script.into(),
                delay: Duration::ZERO,
                started: Arc::new(AtomicU64::new(0)),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl DishClient for ScriptedClient {
        async fn poll(&mut self) -> Result<DishSample, TransportError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.script.pop_front() {
                Some(Some(sample)) => Ok(sample),
                Some(None) => Err(TransportError::Timeout),
                None => Ok(DishSample::new(0.0, Some(1))),
            }
        }

        fn target(&self) -> String {
            "scripted".to_string()
        }
    }

    fn valid(drop_rate: f64, sample_count: u64) -> Option<DishSample> {
        Some(DishSample::new(drop_rate, Some(sample_count)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_once_ingests_success_and_failure() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(1)));
        let mut poller = Poller::new(
            ScriptedClient::new(vec![valid(0.3, 4), None]),
            aggregator.clone(),
            Duration::from_secs(1),
            0.1,
        );

        poller.poll_once().await;
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.samples_total, 4);
        assert_eq!(snapshot.current_drop_rate, 0.3);
        assert!(snapshot.last_update.is_some());

        poller.poll_once().await;
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.samples_total, 4);
        assert_eq!(poller.state(), PollerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_at_one_second_cadence() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(1)));
        let mut poller = Poller::new(
            ScriptedClient::new(vec![
                valid(0.0, 10),
                valid(0.0, 10),
                valid(0.2, 10),
                None,
                valid(0.0, 10),
            ]),
            aggregator.clone(),
            Duration::from_secs(1),
            0.1,
        );

        for _ in 0..5 {
            poller.poll_once().await;
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.samples_total, 40);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.drop_events_total, 1);
        assert_eq!(snapshot.peak_drop_rate, 0.2);
        assert_eq!(snapshot.current_drop_rate, 0.0);
        assert!((snapshot.total_drop_seconds - 1.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_error_leaves_no_update() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(1)));
        let mut poller = Poller::new(
            ScriptedClient::new(vec![None]),
            aggregator.clone(),
            Duration::from_secs(1),
            0.1,
        );

        poller.poll_once().await;
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.errors_total, 1);
        assert!(snapshot.last_update.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_cadence_and_stops_on_signal() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(1)));
        let client = ScriptedClient::new(vec![None, None]);
        let started = client.started.clone();
        let poller = Poller::new(client, aggregator.clone(), Duration::from_secs(1), 0.1);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(poller.run(async move {
            let _ = shutdown_rx.await;
        }));

        // Cycles start at t=0, 1 and 2.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        shutdown_tx.send(()).unwrap();
        let poller = handle.await.unwrap();

        assert_eq!(poller.state(), PollerState::Stopped);
        assert_eq!(started.load(Ordering::SeqCst), 3);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.errors_total, 2);
        assert_eq!(snapshot.samples_total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_delays_next_cycle() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(1)));
        let client = ScriptedClient::new(vec![]).with_delay(Duration::from_secs(3));
        let started = client.started.clone();
        let poller = Poller::new(client, aggregator.clone(), Duration::from_secs(1), 0.1);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(poller.run(async move {
            let _ = shutdown_rx.await;
        }));

        // Polls start at t=0, 4 and 8 and finish three seconds later.
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 3);
        // The third poll was still in flight at shutdown and is never ingested.
        assert_eq!(aggregator.snapshot().samples_total, 2);
    }
}
