//! Per-poll data handed from the transport to the aggregator.

use std::time::{Instant, SystemTime};

/// Static device information reported by the dish.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub hardware_version: String,
    pub software_version: String,
    pub country_code: String,
}

/// Extended dish status carried alongside a drop-rate reading.
///
/// Exported as plain gauges; none of these take part in the counter invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct DishStatus {
    pub pop_ping_latency_ms: f64,
    pub downlink_throughput_bps: f64,
    pub uplink_throughput_bps: f64,
    pub gps_sats: u32,
    pub gps_valid: bool,
    pub obstruction_fraction: f64,
    pub obstruction_time_secs: f64,
    pub snr_above_noise_floor: bool,
    pub boresight_azimuth_deg: f64,
    pub boresight_elevation_deg: f64,
    pub uptime_secs: u64,
    pub eth_speed_mbps: i32,
    pub device_info: Option<DeviceInfo>,
}

/// Raw values returned by one successful transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct DishSample {
    /// PoP ping drop rate in `[0.0, 1.0]`.
    pub drop_rate: f64,
    /// Number of ping samples covered by this poll, `None` when the transport does not batch.
    pub sample_count: Option<u64>,
    pub status: Option<DishStatus>,
}

impl DishSample {
    pub fn new(drop_rate: f64, sample_count: Option<u64>) -> Self {
        Self {
            drop_rate,
            sample_count,
            status: None,
        }
    }

    pub fn with_status(mut self, status: DishStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// One valid reading, stamped with its capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReading {
    pub drop_rate: f64,
    pub sample_count: Option<u64>,
    /// Monotonic capture time, used for elapsed-time arithmetic.
    pub observed_at: Instant,
    /// Wall-clock capture time, used for exposition.
    pub wall_time: SystemTime,
    pub status: Option<DishStatus>,
}

impl SampleReading {
    /// Stamps `sample` with the given capture times.
    ///
    /// Drop rates are clamped into `[0.0, 1.0]`; non-finite ones read as `0.0`.
    pub fn from_sample(sample: DishSample, observed_at: Instant, wall_time: SystemTime) -> Self {
        let drop_rate = if sample.drop_rate.is_finite() {
            sample.drop_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            drop_rate,
            sample_count: sample.sample_count,
            observed_at,
            wall_time,
            status: sample.status,
        }
    }

    /// Number of samples this reading contributes to `samples_total`.
    pub fn effective_sample_count(&self) -> u64 {
        self.sample_count.unwrap_or(1)
    }
}

/// Result of one poll attempt as seen by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Reading(SampleReading),
    Failed,
}
