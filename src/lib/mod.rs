//! ## Starlink Ping Monitor
//!
//! Polls a Starlink dish for its ping-drop rate, folds every reading into running statistics
//! and exposes them as Prometheus metrics.
//!
//! - [`poller`] calls the dish on a fixed cadence through a [`dish::DishClient`]
//! - [`aggregator`] owns the running statistics and the drop-event detector
//! - [`monitoring`] serves `/metrics` and `/health`
use std::{net::SocketAddr, sync::Arc};

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    aggregator::StatsAggregator,
    config::PingMonitorConfig,
    dish::{DishClient, GrpcDishClient},
    error::PingMonitorErrorKind,
    monitoring::MonitoringServer,
    poller::Poller,
};

pub mod aggregator;
pub mod config;
pub mod dish;
pub mod error;
pub mod logging;
pub mod monitoring;
pub mod poller;
pub mod sample;

/// The ping monitor process: one poller and one HTTP server sharing one aggregator.
#[derive(Clone)]
pub struct PingMonitor {
    config: PingMonitorConfig,
    // Latches to `true` once; late subscribers still observe it.
    notify_shutdown: Arc<watch::Sender<bool>>,
}

#[cfg_attr(not(test), hotpath::measure_all)]
impl PingMonitor {
    /// Creates a new [`PingMonitor`] instance.
    pub fn new(config: PingMonitorConfig) -> Self {
        let (notify_shutdown, _) = watch::channel(false);
        Self {
            config,
            notify_shutdown: Arc::new(notify_shutdown),
        }
    }

    /// Starts the monitor against the dish named in the configuration.
    ///
    /// Returns once a shutdown signal has been handled, or with an error if the HTTP port
    /// cannot be bound.
    pub async fn start(&self) -> Result<(), PingMonitorErrorKind> {
        let client = GrpcDishClient::new(
            self.config.dish_ip(),
            self.config.dish_port(),
            self.config.request_timeout(),
        );
        self.start_with_client(client).await
    }

    /// Starts the monitor with the given dish transport.
    pub async fn start_with_client<C>(&self, client: C) -> Result<(), PingMonitorErrorKind>
    where
        C: DishClient + 'static,
    {
        let aggregator = Arc::new(StatsAggregator::new(self.config.poll_interval()));
        let server =
            MonitoringServer::bind(self.config.monitoring_address(), aggregator.clone()).await?;
        self.run(client, aggregator, server).await
    }

    /// Runs the poller and an already bound server until shutdown.
    pub async fn run<C>(
        &self,
        client: C,
        aggregator: Arc<StatsAggregator>,
        server: MonitoringServer,
    ) -> Result<(), PingMonitorErrorKind>
    where
        C: DishClient + 'static,
    {
        self.log_banner(server.local_addr(), &client.target());

        let mut poller_shutdown_rx = self.notify_shutdown.subscribe();
        let poller = Poller::new(
            client,
            aggregator,
            self.config.poll_interval(),
            self.config.alert_threshold(),
        );
        let poller_handle = tokio::spawn(poller.run(async move {
            let _ = poller_shutdown_rx.wait_for(|stop| *stop).await;
        }));

        let notify_shutdown = self.notify_shutdown.clone();
        let mut server_shutdown_rx = self.notify_shutdown.subscribe();
        let server_shutdown = async move {
            tokio::select! {
                _ = server_shutdown_rx.wait_for(|stop| *stop) => {}
                _ = os_shutdown_signal() => {
                    info!("Received shutdown signal, stopping...");
                    notify_shutdown.send_replace(true);
                }
            }
        };

        let result = server.run(server_shutdown).await;
        if let Err(e) = &result {
            error!("{}", e);
        }

        // The poller must stop even when the server ended on its own.
        self.notify_shutdown.send_replace(true);
        if let Err(e) = poller_handle.await {
            warn!("Poller task ended abnormally: {}", e);
        }

        info!("Ping monitor stopped");
        result
    }

    /// Asks the monitor to stop. A request made before [`PingMonitor::run`] makes it return
    /// right after startup.
    pub fn shutdown(&self) {
        self.notify_shutdown.send_replace(true);
    }

    fn log_banner(&self, bind_address: SocketAddr, target: &str) {
        info!("Starlink Ping Monitor v{}", env!("CARGO_PKG_VERSION"));
        info!("Dish: {}", target);
        info!("Metrics: http://{}/metrics", bind_address);
        info!("Health: http://{}/health", bind_address);
    }
}

/// Completes on Ctrl+C, or SIGTERM on unix.
async fn os_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
