// View models - what a gauge or trend chart needs from a snapshot
use crate::domain::channel::{ChannelId, SensorKind};
use crate::domain::classifier::Status;
use crate::domain::dashboard::DashboardState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeView {
    pub channel: ChannelId,
    pub label: &'static str,
    pub unit: &'static str,
    pub value: f64,
    pub max: f64,
    pub status: Status,
    pub status_label: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub channel: ChannelId,
    pub values: Vec<f64>,
    pub color: &'static str,
}

pub fn status_label(status: Status) -> &'static str {
    match status {
        Status::Normal => "Normal",
        Status::Warning => "Warning",
        Status::Critical => "Critical",
    }
}

pub fn status_color(status: Status) -> &'static str {
    match status {
        Status::Normal => "#22c55e",
        Status::Warning => "#f59e0b",
        Status::Critical => "#ef4444",
    }
}

fn label(channel: ChannelId) -> &'static str {
    match channel {
        ChannelId::Temperature => "Temperature",
        ChannelId::Humidity => "Humidity",
        ChannelId::AmbientPressure => "Ambient pressure",
        ChannelId::DifferentialPressure => "Differential pressure",
        ChannelId::AbsolutePressure1 => "Pressure sensor 1",
        ChannelId::AbsolutePressure2 => "Pressure sensor 2",
        ChannelId::AbsolutePressure3 => "Pressure sensor 3",
        ChannelId::FanDuty => "Fan duty",
    }
}

/// Unit and gauge full-scale per kind.
fn scale(kind: SensorKind) -> (&'static str, f64) {
    match kind {
        SensorKind::Temperature => ("°C", 50.0),
        SensorKind::Humidity => ("%", 100.0),
        SensorKind::Pressure => ("Pa", 200_000.0),
        SensorKind::Fan => ("%", 100.0),
    }
}

pub fn gauges(state: &DashboardState) -> Vec<GaugeView> {
    state
        .readings
        .iter()
        .map(|(&channel, reading)| {
            let (unit, max) = scale(channel.kind());
            GaugeView {
                channel,
                label: label(channel),
                unit,
                value: reading.value,
                max,
                status: reading.status,
                status_label: status_label(reading.status),
                color: status_color(reading.status),
            }
        })
        .collect()
}

pub fn charts(state: &DashboardState) -> Vec<ChartView> {
    state
        .histories
        .iter()
        .map(|(&channel, history)| {
            let status = state
                .reading(channel)
                .map(|r| r.status)
                .unwrap_or_default();
            ChartView {
                channel,
                values: history.values().collect(),
                color: status_color(status),
            }
        })
        .collect()
}
