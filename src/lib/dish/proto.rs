//! Subset of the dish device API (`SpaceX.API.Device`) used by the monitor.
//!
//! Only the fields the monitor reads are declared; protobuf skips the rest on decode.

/// Full method path of the single unary RPC the device service exposes.
pub const HANDLE_PATH: &str = "/SpaceX.API.Device.Device/Handle";

#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    #[prost(oneof = "request::Request", tags = "1004, 1007")]
    pub request: Option<request::Request>,
}

pub mod request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1004")]
        GetStatus(super::GetStatusRequest),
        #[prost(message, tag = "1007")]
        GetHistory(super::GetHistoryRequest),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetStatusRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetHistoryRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    #[prost(oneof = "response::Response", tags = "2004, 2006")]
    pub response: Option<response::Response>,
}

pub mod response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "2004")]
        DishGetStatus(super::DishGetStatusResponse),
        #[prost(message, tag = "2006")]
        DishGetHistory(super::DishGetHistoryResponse),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceInfo {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub hardware_version: String,
    #[prost(string, tag = "3")]
    pub software_version: String,
    #[prost(string, tag = "4")]
    pub country_code: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceState {
    #[prost(uint64, tag = "1")]
    pub uptime_s: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DishObstructionStats {
    #[prost(float, tag = "1")]
    pub fraction_obstructed: f32,
    #[prost(float, tag = "9")]
    pub time_obstructed: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DishGpsStats {
    #[prost(bool, tag = "1")]
    pub gps_valid: bool,
    #[prost(uint32, tag = "2")]
    pub gps_sats: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DishGetStatusResponse {
    #[prost(message, optional, tag = "1")]
    pub device_info: Option<DeviceInfo>,
    #[prost(message, optional, tag = "2")]
    pub device_state: Option<DeviceState>,
    #[prost(float, tag = "1003")]
    pub pop_ping_drop_rate: f32,
    #[prost(message, optional, tag = "1004")]
    pub obstruction_stats: Option<DishObstructionStats>,
    #[prost(float, tag = "1007")]
    pub downlink_throughput_bps: f32,
    #[prost(float, tag = "1008")]
    pub uplink_throughput_bps: f32,
    #[prost(float, tag = "1009")]
    pub pop_ping_latency_ms: f32,
    #[prost(float, tag = "1011")]
    pub boresight_azimuth_deg: f32,
    #[prost(float, tag = "1012")]
    pub boresight_elevation_deg: f32,
    #[prost(message, optional, tag = "1015")]
    pub gps_stats: Option<DishGpsStats>,
    #[prost(int32, tag = "1016")]
    pub eth_speed_mbps: i32,
    #[prost(bool, tag = "1018")]
    pub is_snr_above_noise_floor: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DishGetHistoryResponse {
    /// Total number of samples the dish has written into its ring buffer.
    #[prost(uint64, tag = "1")]
    pub current: u64,
    #[prost(float, repeated, tag = "1001")]
    pub pop_ping_drop_rate: Vec<f32>,
}
