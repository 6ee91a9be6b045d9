use crate::application::session::{DEFAULT_POLL_INTERVAL, SessionSettings};
use crate::domain::channel::{ChannelConfig, ChannelId, ChannelRegistry, Thresholds};
use crate::domain::classifier::ThresholdPolicy;
use crate::domain::history::DEFAULT_WINDOW;
use crate::domain::reading_log::DEFAULT_LOG_CAPACITY;
use crate::infrastructure::mqtt_transport::MqttSettings;
use anyhow::Context;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const MODE_VAR: &str = "DASHBOARD_MODE";

/// Selects the configuration overlay that sits on top of the base file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// `DASHBOARD_MODE` wins; otherwise debug builds are development.
    pub fn detect() -> Self {
        std::env::var(MODE_VAR)
            .ok()
            .and_then(|raw| Self::parse(&raw))
            .unwrap_or(if cfg!(debug_assertions) {
                BuildMode::Development
            } else {
                BuildMode::Production
            })
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(BuildMode::Development),
            "prod" | "production" => Some(BuildMode::Production),
            _ => None,
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => f.write_str("development"),
            BuildMode::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub channels: Vec<ChannelOverride>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub event_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "sensor-dashboard".to_string(),
            keep_alive_secs: 15,
            reconnect_delay_ms: 2_000,
            event_buffer: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub namespaces: Vec<String>,
    /// Empty means every registered channel, bare and namespaced.
    pub subscriptions: Vec<String>,
    pub history_window: usize,
    pub log_capacity: usize,
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespaces: vec!["pmcd".to_string()],
            subscriptions: Vec::new(),
            history_window: DEFAULT_WINDOW,
            log_capacity: DEFAULT_LOG_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub policy: ThresholdPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelOverride {
    pub id: ChannelId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
}

fn enabled_by_default() -> bool {
    true
}

impl DashboardConfig {
    /// Registered channels with overrides applied. Fails on an override whose
    /// bounds are not finite or not ordered.
    pub fn registry(&self) -> anyhow::Result<ChannelRegistry> {
        let mut configs = Vec::with_capacity(ChannelId::ALL.len());
        for id in ChannelId::ALL {
            match self.channels.iter().find(|o| o.id == id) {
                None => configs.push(ChannelConfig::default_for(id)),
                Some(o) if !o.enabled => {}
                Some(o) => match o.thresholds {
                    Some(thresholds) => {
                        thresholds
                            .validate()
                            .with_context(|| format!("invalid thresholds for channel {id}"))?;
                        configs.push(ChannelConfig::new(id, Some(thresholds)));
                    }
                    None => configs.push(ChannelConfig::default_for(id)),
                },
            }
        }
        Ok(ChannelRegistry::new(self.session.namespaces.clone(), configs))
    }

    pub fn subscriptions(&self, registry: &ChannelRegistry) -> Vec<String> {
        if !self.session.subscriptions.is_empty() {
            return self.session.subscriptions.clone();
        }
        registry
            .channels()
            .map(|id| id.topic().to_string())
            .chain(registry.namespaces().iter().map(|ns| format!("{ns}/+")))
            .collect()
    }

    pub fn session_settings(&self, registry: &ChannelRegistry) -> SessionSettings {
        SessionSettings {
            subscriptions: self.subscriptions(registry),
            poll_interval: Duration::from_millis(self.session.poll_interval_ms.max(1)),
        }
    }

    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.broker.host.clone(),
            port: self.broker.port,
            client_id: self.broker.client_id.clone(),
            keep_alive: Duration::from_secs(self.broker.keep_alive_secs),
            reconnect_delay: Duration::from_millis(self.broker.reconnect_delay_ms),
            event_buffer: self.broker.event_buffer,
        }
    }
}

fn base_builder(mode: BuildMode) -> ConfigBuilder<DefaultState> {
    config::Config::builder()
        .add_source(File::with_name("config/dashboard").required(false))
        .add_source(File::with_name(&format!("config/dashboard.{mode}")).required(false))
}

/// Defaults, then `config/dashboard`, then the mode overlay, then
/// `DASHBOARD__SECTION__KEY` environment variables.
pub fn load_dashboard_config(mode: BuildMode) -> anyhow::Result<DashboardConfig> {
    let settings = base_builder(mode)
        .add_source(
            Environment::with_prefix("DASHBOARD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: DashboardConfig = settings.try_deserialize()?;
    config.registry()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::{Polarity, RangeError};
    use config::FileFormat;

    fn from_toml(toml: &str) -> DashboardConfig {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.session.history_window, 20);
        assert_eq!(config.classification.policy, ThresholdPolicy::Normalized);

        let registry = config.registry().unwrap();
        assert_eq!(registry.channels().count(), ChannelId::ALL.len());
        let subscriptions = config.subscriptions(&registry);
        assert!(subscriptions.contains(&"temp".to_string()));
        assert!(subscriptions.contains(&"pmcd/+".to_string()));
        assert_eq!(
            config.session_settings(&registry).poll_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_overrides() {
        let config = from_toml(
            r#"
            [broker]
            host = "broker.lab"
            port = 1884

            [session]
            namespaces = ["lab"]
            subscriptions = ["lab/#"]
            poll_interval_ms = 500

            [classification]
            policy = "absolute"

            [[channels]]
            id = "fanduty"
            enabled = false

            [[channels]]
            id = "pabs1"
            thresholds = { polarity = "high_is_bad", high_warn = 150000.0, high = 180000.0 }
            "#,
        );

        assert_eq!(config.mqtt_settings().host, "broker.lab");
        assert_eq!(config.mqtt_settings().port, 1884);
        assert_eq!(config.classification.policy, ThresholdPolicy::Absolute);

        let registry = config.registry().unwrap();
        assert_eq!(registry.resolve("fanduty"), None);
        assert_eq!(registry.resolve("lab/temp"), Some(ChannelId::Temperature));
        assert_eq!(registry.resolve("pmcd/temp"), None);

        let thresholds = registry
            .config(ChannelId::AbsolutePressure1)
            .and_then(|c| c.thresholds)
            .unwrap();
        assert_eq!(thresholds.polarity, Polarity::HighIsBad);
        assert_eq!(thresholds.high_warn, Some(150_000.0));
        assert_eq!(thresholds.low, None);

        let settings = config.session_settings(&registry);
        assert_eq!(settings.subscriptions, vec!["lab/#".to_string()]);
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_build_mode_parse() {
        assert_eq!(BuildMode::parse("prod"), Some(BuildMode::Production));
        assert_eq!(BuildMode::parse(" Development "), Some(BuildMode::Development));
        assert_eq!(BuildMode::parse("staging"), None);
        assert_eq!(BuildMode::Production.to_string(), "production");
    }

    #[test]
    fn test_inverted_override_rejected() {
        let config = from_toml(
            r#"
            [[channels]]
            id = "pabs1"
            thresholds = { polarity = "high_is_bad", low = 200000.0, high = 0.0 }
            "#,
        );

        let err = config.registry().unwrap_err();
        assert!(err.to_string().contains("pabs1"));
        assert_eq!(
            err.downcast_ref::<RangeError>(),
            Some(&RangeError::Inverted { min: 200_000.0, max: 0.0 })
        );
    }

    #[test]
    fn test_disabled_override_skips_validation() {
        let config = from_toml(
            r#"
            [[channels]]
            id = "pabs2"
            enabled = false
            thresholds = { polarity = "high_is_bad", low = 10.0, high = 1.0 }
            "#,
        );
        let registry = config.registry().unwrap();
        assert_eq!(registry.resolve("pabs2"), None);
    }
}
