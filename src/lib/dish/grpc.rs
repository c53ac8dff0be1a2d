//! gRPC client for the dish's local device API.

use std::time::Duration;

use async_trait::async_trait;
use tonic::{
    codec::ProstCodec,
    codegen::http::uri::PathAndQuery,
    transport::{Channel, Endpoint},
};
use tracing::{debug, info};

use super::{
    proto::{self, request, response},
    DishClient,
};
use crate::{
    error::TransportError,
    sample::{DeviceInfo, DishSample, DishStatus},
};

/// Polls the dish over gRPC, reconnecting after any failure.
#[derive(Debug)]
pub struct GrpcDishClient {
    address: String,
    port: u16,
    request_timeout: Duration,
    channel: Option<Channel>,
    // History ring counter seen on the previous successful poll.
    last_counter: Option<u64>,
}

impl GrpcDishClient {
    pub fn new(address: impl Into<String>, port: u16, request_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            port,
            request_timeout,
            channel: None,
            last_counter: None,
        }
    }

    async fn channel(&mut self) -> Result<Channel, TransportError> {
        if let Some(channel) = &self.channel {
            return Ok(channel.clone());
        }

        info!("Connecting to dish at {}...", self.target());
        let endpoint = Endpoint::from_shared(format!("http://{}:{}", self.address, self.port))
            .map_err(|e| TransportError::Connect(e.to_string()))?
            .connect_timeout(self.request_timeout)
            .timeout(self.request_timeout);

        let channel = tokio::time::timeout(self.request_timeout, endpoint.connect())
            .await
            .map_err(|_| TransportError::Timeout)??;

        info!("Connected to dish at {}", self.target());
        self.channel = Some(channel.clone());
        Ok(channel)
    }

    async fn handle(
        &self,
        channel: Channel,
        request: request::Request,
    ) -> Result<response::Response, TransportError> {
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let codec = ProstCodec::<proto::Request, proto::Response>::default();
        let path = PathAndQuery::from_static(proto::HANDLE_PATH);
        let request = tonic::Request::new(proto::Request {
            request: Some(request),
        });

        let response = tokio::time::timeout(self.request_timeout, grpc.unary(request, path, codec))
            .await
            .map_err(|_| TransportError::Timeout)??;

        response
            .into_inner()
            .response
            .ok_or(TransportError::UnexpectedResponse("a response body"))
    }

    async fn fetch(&mut self) -> Result<DishSample, TransportError> {
        let channel = self.channel().await?;

        let status = match self
            .handle(
                channel.clone(),
                request::Request::GetStatus(proto::GetStatusRequest {}),
            )
            .await?
        {
            response::Response::DishGetStatus(status) => status,
            _ => return Err(TransportError::UnexpectedResponse("dish_get_status")),
        };

        let history = match self
            .handle(
                channel,
                request::Request::GetHistory(proto::GetHistoryRequest {}),
            )
            .await?
        {
            response::Response::DishGetHistory(history) => history,
            _ => return Err(TransportError::UnexpectedResponse("dish_get_history")),
        };

        let new_samples = new_sample_count(
            self.last_counter,
            history.current,
            history.pop_ping_drop_rate.len(),
        );
        self.last_counter = Some(history.current);

        debug!(
            "Dish status: drop={:.2}%, latency={:.2}ms, new_samples={}",
            status.pop_ping_drop_rate * 100.0,
            status.pop_ping_latency_ms,
            new_samples
        );

        Ok(
            DishSample::new(status.pop_ping_drop_rate as f64, Some(new_samples))
                .with_status(status_from_proto(&status)),
        )
    }
}

#[async_trait]
impl DishClient for GrpcDishClient {
    async fn poll(&mut self) -> Result<DishSample, TransportError> {
        let result = self.fetch().await;
        if result.is_err() && self.channel.take().is_some() {
            debug!("Dropping dish channel, will reconnect on next poll");
        }
        result
    }

    fn target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Number of history samples written since the previous poll.
///
/// `ring_len` caps the count: samples that rolled out of the ring are lost. The first poll
/// counts the whole ring. A counter that went backwards means the dish rebooted, in which case
/// everything up to the new counter is new.
fn new_sample_count(last_counter: Option<u64>, current: u64, ring_len: usize) -> u64 {
    let ring_len = ring_len as u64;
    match last_counter {
        None => ring_len,
        Some(last) if last <= current => (current - last).min(ring_len),
        Some(_) => current.min(ring_len),
    }
}

fn non_empty_or_unknown(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}

fn status_from_proto(status: &proto::DishGetStatusResponse) -> DishStatus {
    let gps = status.gps_stats.clone().unwrap_or_default();
    let obstruction = status.obstruction_stats.clone().unwrap_or_default();

    DishStatus {
        pop_ping_latency_ms: status.pop_ping_latency_ms as f64,
        downlink_throughput_bps: status.downlink_throughput_bps as f64,
        uplink_throughput_bps: status.uplink_throughput_bps as f64,
        gps_sats: gps.gps_sats,
        gps_valid: gps.gps_valid,
        obstruction_fraction: obstruction.fraction_obstructed as f64,
        obstruction_time_secs: obstruction.time_obstructed as f64,
        snr_above_noise_floor: status.is_snr_above_noise_floor,
        boresight_azimuth_deg: status.boresight_azimuth_deg as f64,
        boresight_elevation_deg: status.boresight_elevation_deg as f64,
        uptime_secs: status
            .device_state
            .as_ref()
            .map(|s| s.uptime_s)
            .unwrap_or_default(),
        eth_speed_mbps: status.eth_speed_mbps,
        device_info: status.device_info.as_ref().map(|info| DeviceInfo {
            hardware_version: non_empty_or_unknown(&info.hardware_version),
            software_version: non_empty_or_unknown(&info.software_version),
            country_code: non_empty_or_unknown(&info.country_code),
        }),
    }
}
