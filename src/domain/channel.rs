// Channel registry - maps topic names to logical sensor channels
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Logical sensor measurement a topic feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    #[serde(rename = "temp")]
    Temperature,
    #[serde(rename = "hum")]
    Humidity,
    #[serde(rename = "pamb")]
    AmbientPressure,
    #[serde(rename = "pdif")]
    DifferentialPressure,
    #[serde(rename = "pabs1")]
    AbsolutePressure1,
    #[serde(rename = "pabs2")]
    AbsolutePressure2,
    #[serde(rename = "pabs3")]
    AbsolutePressure3,
    #[serde(rename = "fanduty")]
    FanDuty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Pressure,
    Fan,
}

impl ChannelId {
    pub const ALL: [ChannelId; 8] = [
        ChannelId::Temperature,
        ChannelId::Humidity,
        ChannelId::AmbientPressure,
        ChannelId::DifferentialPressure,
        ChannelId::AbsolutePressure1,
        ChannelId::AbsolutePressure2,
        ChannelId::AbsolutePressure3,
        ChannelId::FanDuty,
    ];

    /// Bare topic name, without namespace.
    pub fn topic(&self) -> &'static str {
        match self {
            ChannelId::Temperature => "temp",
            ChannelId::Humidity => "hum",
            ChannelId::AmbientPressure => "pamb",
            ChannelId::DifferentialPressure => "pdif",
            ChannelId::AbsolutePressure1 => "pabs1",
            ChannelId::AbsolutePressure2 => "pabs2",
            ChannelId::AbsolutePressure3 => "pabs3",
            ChannelId::FanDuty => "fanduty",
        }
    }

    pub fn from_topic(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.topic() == name)
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            ChannelId::Temperature => SensorKind::Temperature,
            ChannelId::Humidity => SensorKind::Humidity,
            ChannelId::FanDuty => SensorKind::Fan,
            _ => SensorKind::Pressure,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

/// Which side of the range is the bad one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HighIsBad,
    LowIsBad,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub polarity: Polarity,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low_warn: Option<f64>,
    #[serde(default)]
    pub high_warn: Option<f64>,
}

impl Thresholds {
    pub fn high_is_bad() -> Self {
        Self {
            polarity: Polarity::HighIsBad,
            low: None,
            high: None,
            low_warn: None,
            high_warn: None,
        }
    }

    pub fn low_is_bad() -> Self {
        Self {
            polarity: Polarity::LowIsBad,
            ..Self::high_is_bad()
        }
    }

    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.low = Some(low);
        self.high = Some(high);
        self
    }

    pub fn with_high(mut self, high_warn: f64, high: f64) -> Self {
        self.high_warn = Some(high_warn);
        self.high = Some(high);
        self
    }

    pub fn with_low(mut self, low: f64, low_warn: f64) -> Self {
        self.low = Some(low);
        self.low_warn = Some(low_warn);
        self
    }

    /// Every bound finite; `low <= low_warn`, `high_warn <= high`, `low <= high`.
    pub fn validate(&self) -> Result<(), RangeError> {
        for (min, max) in [
            (self.low, self.high),
            (self.low, self.low_warn),
            (self.high_warn, self.high),
        ] {
            match (min, max) {
                (Some(min), Some(max)) => check_range(min, max)?,
                (Some(bound), None) | (None, Some(bound)) => check_range(bound, bound)?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

fn check_range(min: f64, max: f64) -> Result<(), RangeError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(RangeError::NotFinite { min, max });
    }
    if min > max {
        return Err(RangeError::Inverted { min, max });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub id: ChannelId,
    pub thresholds: Option<Thresholds>,
}

impl ChannelConfig {
    pub fn new(id: ChannelId, thresholds: Option<Thresholds>) -> Self {
        Self { id, thresholds }
    }

    /// Built-in thresholds used when configuration does not override a channel.
    pub fn default_for(id: ChannelId) -> Self {
        let thresholds = match id {
            ChannelId::Temperature => Some(Thresholds::high_is_bad().with_high(30.0, 35.0)),
            ChannelId::Humidity => Some(Thresholds::low_is_bad().with_low(20.0, 30.0)),
            ChannelId::AbsolutePressure1
            | ChannelId::AbsolutePressure2
            | ChannelId::AbsolutePressure3 => {
                Some(Thresholds::high_is_bad().with_range(0.0, 200_000.0))
            }
            _ => None,
        };
        Self::new(id, thresholds)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("range bounds must be finite (min={min}, max={max})")]
    NotFinite { min: f64, max: f64 },
    #[error("range minimum {min} is above maximum {max}")]
    Inverted { min: f64, max: f64 },
    #[error("channel {0} is not registered")]
    UnknownChannel(ChannelId),
}

/// Static mapping of topic names to channels and their configuration.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    namespaces: Vec<String>,
    configs: BTreeMap<ChannelId, ChannelConfig>,
}

impl ChannelRegistry {
    pub fn new(namespaces: Vec<String>, configs: impl IntoIterator<Item = ChannelConfig>) -> Self {
        let namespaces = namespaces
            .into_iter()
            .map(|ns| ns.trim_matches('/').to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        let configs = configs.into_iter().map(|c| (c.id, c)).collect();
        Self { namespaces, configs }
    }

    /// Every known channel with its built-in thresholds.
    pub fn with_defaults(namespaces: Vec<String>) -> Self {
        Self::new(namespaces, ChannelId::ALL.into_iter().map(ChannelConfig::default_for))
    }

    /// Resolve a topic, bare or namespaced, to a registered channel.
    pub fn resolve(&self, topic: &str) -> Option<ChannelId> {
        let name = self
            .namespaces
            .iter()
            .find_map(|ns| {
                topic
                    .strip_prefix(ns.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
            })
            .unwrap_or(topic);

        ChannelId::from_topic(name).filter(|id| self.configs.contains_key(id))
    }

    pub fn config(&self, id: ChannelId) -> Option<&ChannelConfig> {
        self.configs.get(&id)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.configs.keys().copied()
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Operator edit of a channel's min/max bounds.
    pub fn set_range(&mut self, id: ChannelId, min: f64, max: f64) -> Result<(), RangeError> {
        check_range(min, max)?;
        let config = self
            .configs
            .get_mut(&id)
            .ok_or(RangeError::UnknownChannel(id))?;
        let thresholds = config
            .thresholds
            .get_or_insert_with(Thresholds::high_is_bad);
        thresholds.low = Some(min);
        thresholds.high = Some(max);
        Ok(())
    }
}
