//! Prometheus text exposition of an [`AggregateSnapshot`].
//!
//! Metric families are built straight from the snapshot on every scrape, in a fixed order, so two
//! scrapes only differ in their values and concurrent scrapes never share mutable metric objects.

use std::time::Duration;

use prometheus::{
    proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType},
    Encoder, TextEncoder,
};

use crate::{aggregator::AggregateSnapshot, error::InternalError, sample::DishStatus};

/// Content type of the rendered listing.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

fn family(name: &str, help: &str, field_type: MetricType, metric: Metric) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(name.to_string());
    family.set_help(help.to_string());
    family.set_field_type(field_type);
    family.mut_metric().push(metric);
    family
}

fn gauge(name: &str, help: &str, value: f64) -> MetricFamily {
    let mut gauge = Gauge::default();
    gauge.set_value(value);
    let mut metric = Metric::default();
    metric.set_gauge(gauge);
    family(name, help, MetricType::GAUGE, metric)
}

fn counter(name: &str, help: &str, value: f64) -> MetricFamily {
    let mut counter = Counter::default();
    counter.set_value(value);
    let mut metric = Metric::default();
    metric.set_counter(counter);
    family(name, help, MetricType::COUNTER, metric)
}

fn label(name: &str, value: &str) -> LabelPair {
    let mut pair = LabelPair::default();
    pair.set_name(name.to_string());
    pair.set_value(value.to_string());
    pair
}

fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn dish_status_families(status: &DishStatus, families: &mut Vec<MetricFamily>) {
    families.push(gauge(
        "starlink_pop_ping_latency_ms",
        "Round-trip latency to Starlink Point of Presence in milliseconds",
        status.pop_ping_latency_ms,
    ));
    families.push(gauge(
        "starlink_downlink_throughput_bps",
        "Current downlink (download) throughput in bits per second",
        status.downlink_throughput_bps,
    ));
    families.push(gauge(
        "starlink_uplink_throughput_bps",
        "Current uplink (upload) throughput in bits per second",
        status.uplink_throughput_bps,
    ));
    families.push(gauge(
        "starlink_gps_satellites",
        "Number of GPS satellites currently tracked",
        status.gps_sats as f64,
    ));
    families.push(gauge(
        "starlink_gps_valid",
        "GPS lock status (1=valid, 0=invalid)",
        bool_gauge(status.gps_valid),
    ));
    families.push(gauge(
        "starlink_obstruction_fraction",
        "Fraction of time the dish view is obstructed (0.0-1.0)",
        status.obstruction_fraction,
    ));
    families.push(gauge(
        "starlink_obstruction_time_seconds",
        "Total time obstructed in seconds",
        status.obstruction_time_secs,
    ));
    families.push(gauge(
        "starlink_snr_above_noise_floor",
        "Signal-to-noise ratio quality indicator (1=good, 0=poor)",
        bool_gauge(status.snr_above_noise_floor),
    ));
    families.push(gauge(
        "starlink_boresight_azimuth_degrees",
        "Dish boresight azimuth angle in degrees",
        status.boresight_azimuth_deg,
    ));
    families.push(gauge(
        "starlink_boresight_elevation_degrees",
        "Dish boresight elevation angle in degrees",
        status.boresight_elevation_deg,
    ));
    families.push(gauge(
        "starlink_uptime_seconds",
        "Device uptime in seconds",
        status.uptime_secs as f64,
    ));
    families.push(gauge(
        "starlink_eth_speed_mbps",
        "Ethernet link speed in Mbps",
        status.eth_speed_mbps as f64,
    ));

    if let Some(ref info) = status.device_info {
        let mut metric = Metric::default();
        let mut value = Gauge::default();
        value.set_value(1.0);
        metric.set_gauge(value);
        metric
            .mut_label()
            .push(label("hardware_version", &info.hardware_version));
        metric
            .mut_label()
            .push(label("software_version", &info.software_version));
        metric
            .mut_label()
            .push(label("country_code", &info.country_code));
        families.push(family(
            "starlink_info",
            "Static device information",
            MetricType::GAUGE,
            metric,
        ));
    }
}

/// Builds every metric family for `snapshot`, in exposition order.
pub fn collect(snapshot: &AggregateSnapshot, uptime: Duration) -> Vec<MetricFamily> {
    let mut families = vec![
        gauge(
            "starlink_ping_drop_rate_current",
            "Current ping drop rate (0.0-1.0)",
            snapshot.current_drop_rate,
        ),
        gauge(
            "starlink_ping_drop_rate_peak",
            "Peak ping drop rate observed (0.0-1.0)",
            snapshot.peak_drop_rate,
        ),
        counter(
            "starlink_ping_drop_total_seconds",
            "Total time with packet loss in seconds",
            snapshot.total_drop_seconds,
        ),
        counter(
            "starlink_ping_drop_events_total",
            "Number of ping drop events (transitions to dropping state)",
            snapshot.drop_events_total as f64,
        ),
        counter(
            "starlink_ping_samples_total",
            "Total number of samples processed",
            snapshot.samples_total as f64,
        ),
    ];

    if let Some(ref status) = snapshot.dish_status {
        dish_status_families(status, &mut families);
    }

    families.push(gauge(
        "starlink_monitor_last_update_timestamp",
        "Unix timestamp of last successful update (NaN before the first one)",
        snapshot.last_update_unix_secs().unwrap_or(f64::NAN),
    ));
    families.push(counter(
        "starlink_monitor_errors_total",
        "Total number of errors communicating with dish",
        snapshot.errors_total as f64,
    ));
    families.push(counter(
        "starlink_monitor_scrapes_total",
        "Total number of metric scrapes",
        snapshot.scrapes_total as f64,
    ));
    families.push(counter(
        "starlink_monitor_uptime_seconds",
        "Uptime of the monitoring service in seconds",
        uptime.as_secs_f64(),
    ));

    families
}

/// Renders `snapshot` in the Prometheus text format.
pub fn encode(snapshot: &AggregateSnapshot, uptime: Duration) -> Result<String, InternalError> {
    let families = collect(snapshot, uptime);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
