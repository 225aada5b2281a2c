// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use telemetry_relay::announcer::TopicAnnouncer;
use telemetry_relay::constants::CONTROL_TOPIC;
use telemetry_relay::mqtt::{qos_from_level, MqttConfig, DEFAULT_PORT};
use telemetry_relay::publisher::PublisherConfig;

use crate::error::AgentError;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const DEFAULT_APACHE_LOG_DIR: &str = "/var/log/apache2";
const DEFAULT_OUTPUT_DIR: &str = "Received Messages";

/// Broker connection settings shared by both processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker TCP port
    pub port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// MQTT quality of service level (0, 1 or 2)
    pub qos: u8,
}

impl BrokerConfig {
    fn with_client_id(client_id: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            client_id: client_id.to_string(),
            qos: 0,
        }
    }

    fn from_lookup<F>(lookup: &F, default_client_id: &str) -> Result<Self, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::with_client_id(default_client_id);
        Ok(Self {
            host: lookup("RELAY_BROKER_HOST").unwrap_or(defaults.host),
            port: parse_var(lookup, "RELAY_BROKER_PORT")?.unwrap_or(defaults.port),
            client_id: lookup("RELAY_CLIENT_ID").unwrap_or(defaults.client_id),
            qos: parse_var(lookup, "RELAY_QOS")?.unwrap_or(defaults.qos),
        })
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.host.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "RELAY_BROKER_HOST cannot be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(AgentError::InvalidConfig(
                "Broker port must be greater than 0".to_string(),
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "RELAY_CLIENT_ID cannot be empty".to_string(),
            ));
        }
        if qos_from_level(self.qos).is_none() {
            return Err(AgentError::InvalidConfig(format!(
                "Invalid QoS {}. Must be one of: 0, 1, 2",
                self.qos
            )));
        }
        Ok(())
    }

    pub fn mqtt_config(&self) -> Result<MqttConfig, AgentError> {
        let qos = qos_from_level(self.qos)
            .ok_or_else(|| AgentError::InvalidConfig(format!("Invalid QoS {}", self.qos)))?;
        Ok(MqttConfig {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            qos,
            ..MqttConfig::default()
        })
    }
}

/// Configuration for the publisher process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherAgentConfig {
    pub broker: BrokerConfig,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// How long to publish metrics before sending the log bundles
    pub run_seconds: u64,
    pub publish_interval_secs: u64,
    /// Wait after announcing topics, giving subscribers time to subscribe
    pub announce_grace_secs: u64,
    /// Directory searched recursively for access and error logs
    pub apache_log_dir: PathBuf,
}

impl Default for PublisherAgentConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::with_client_id("telemetry-publisher"),
            log_level: "info".to_string(),
            run_seconds: 60,
            publish_interval_secs: 1,
            announce_grace_secs: 2,
            apache_log_dir: PathBuf::from(DEFAULT_APACHE_LOG_DIR),
        }
    }
}

impl PublisherAgentConfig {
    /// Create configuration from environment variables. A first command line argument,
    /// when given, overrides `RELAY_RUN_SECONDS`.
    pub fn from_env() -> Result<Self, AgentError> {
        let run_seconds_arg = env::args().nth(1);
        Self::from_lookup(|key| env::var(key).ok(), run_seconds_arg.as_deref())
    }

    pub fn from_lookup<F>(lookup: F, run_seconds_arg: Option<&str>) -> Result<Self, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let run_seconds = match run_seconds_arg {
            Some(arg) => parse_value("run seconds argument", arg)?,
            None => parse_var(&lookup, "RELAY_RUN_SECONDS")?.unwrap_or(defaults.run_seconds),
        };

        let config = Self {
            broker: BrokerConfig::from_lookup(&lookup, &defaults.broker.client_id)?,
            log_level: log_level(&lookup),
            run_seconds,
            publish_interval_secs: parse_var(&lookup, "RELAY_PUBLISH_INTERVAL_SECS")?
                .unwrap_or(defaults.publish_interval_secs),
            announce_grace_secs: parse_var(&lookup, "RELAY_ANNOUNCE_GRACE_SECS")?
                .unwrap_or(defaults.announce_grace_secs),
            apache_log_dir: lookup("RELAY_APACHE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.apache_log_dir),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        self.broker.validate()?;
        validate_log_level(&self.log_level)?;
        if self.publish_interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "Publish interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            run_duration: Duration::from_secs(self.run_seconds),
            publish_interval: Duration::from_secs(self.publish_interval_secs),
            announcer: TopicAnnouncer::new(
                CONTROL_TOPIC,
                Duration::from_secs(self.announce_grace_secs),
            ),
            log_root: self.apache_log_dir.clone(),
            ..PublisherConfig::default()
        }
    }
}

/// Configuration for the subscriber process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberAgentConfig {
    pub broker: BrokerConfig,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// Parent of the per-run output directories
    pub output_dir: PathBuf,
}

impl Default for SubscriberAgentConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::with_client_id("telemetry-subscriber"),
            log_level: "info".to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl SubscriberAgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let output_dir = match lookup("RELAY_OUTPUT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()
                .map(|cwd| cwd.join(DEFAULT_OUTPUT_DIR))
                .unwrap_or(defaults.output_dir),
        };

        let config = Self {
            broker: BrokerConfig::from_lookup(&lookup, &defaults.broker.client_id)?,
            log_level: log_level(&lookup),
            output_dir,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        self.broker.validate()?;
        validate_log_level(&self.log_level)?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(AgentError::InvalidConfig(
                "RELAY_OUTPUT_DIR cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn log_level<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("RELAY_LOG_LEVEL")
        .map(|val| val.trim().to_lowercase())
        .unwrap_or_else(|| "info".to_string())
}

fn validate_log_level(log_level: &str) -> Result<(), AgentError> {
    if !VALID_LOG_LEVELS.contains(&log_level) {
        return Err(AgentError::InvalidConfig(format!(
            "Invalid log level '{log_level}'. Must be one of: trace, debug, info, warn, error"
        )));
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AgentError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| parse_value(key, &value))
        .transpose()
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, AgentError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AgentError::InvalidConfig(format!("Invalid {name} '{value}': {e}")))
}
