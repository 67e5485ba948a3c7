// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! service_name = "PrimeCalculator"
//! domain_id = 0
//! max_wait_secs = 20
//!
//! [requester]
//! reliability = "reliable"
//!
//! [replier]
//! history_depth = 64
//! ```

use crate::qos::{QoS, Reliability};
use crate::rpc::EndpointParams;
use crate::transport::MAX_DOMAIN_ID;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// QoS overrides of one endpoint side.
///
/// Without overrides an endpoint is reliable and keeps every sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosProfile {
    /// `reliable` or `best_effort`.
    #[serde(default)]
    pub reliability: Reliability,

    /// Keep only the last N samples instead of all of them.
    #[serde(default)]
    pub history_depth: Option<usize>,

    /// Bound of a keep-all history.
    #[serde(default)]
    pub max_samples: Option<usize>,
}

impl QosProfile {
    pub fn to_qos(&self) -> QoS {
        let mut qos = match self.reliability {
            Reliability::Reliable => QoS::reliable(),
            Reliability::BestEffort => QoS::best_effort(),
        };
        if let Some(depth) = self.history_depth {
            qos = qos.keep_last(depth);
        }
        if let Some(max) = self.max_samples {
            qos = qos.max_samples(max);
        }
        qos
    }
}

/// Configuration of a request/reply service and its two endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name; topics are `rq/<name>` and `rr/<name>`.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Domain to join.
    #[serde(default)]
    pub domain_id: u32,

    /// Poll period while waiting for a replier (milliseconds).
    #[serde(default = "default_discovery_poll_ms")]
    pub discovery_poll_ms: u64,

    /// Longest wait for the next reply before the requester gives up (seconds).
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// QoS of the requester's endpoints.
    #[serde(default)]
    pub requester: QosProfile,

    /// QoS of the replier's endpoints.
    #[serde(default)]
    pub replier: QosProfile,
}

fn default_service_name() -> String {
    crate::primes::SERVICE_NAME.to_string()
}

fn default_discovery_poll_ms() -> u64 {
    100
}

fn default_max_wait_secs() -> u64 {
    20
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            domain_id: 0,
            discovery_poll_ms: default_discovery_poll_ms(),
            max_wait_secs: default_max_wait_secs(),
            requester: QosProfile::default(),
            replier: QosProfile::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::Invalid("service_name is empty".into()));
        }
        if self.service_name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "service_name '{}' must not contain '/'",
                self.service_name
            )));
        }
        if self.domain_id > MAX_DOMAIN_ID {
            return Err(ConfigError::Invalid(format!(
                "domain_id {} out of range (0-{})",
                self.domain_id, MAX_DOMAIN_ID
            )));
        }
        if self.discovery_poll_ms == 0 {
            return Err(ConfigError::Invalid("discovery_poll_ms must be > 0".into()));
        }

        for (side, profile) in [("requester", &self.requester), ("replier", &self.replier)] {
            if profile.history_depth == Some(0) {
                return Err(ConfigError::Invalid(format!("[{}] history_depth must be > 0", side)));
            }
            if profile.max_samples == Some(0) {
                return Err(ConfigError::Invalid(format!("[{}] max_samples must be > 0", side)));
            }
        }

        Ok(())
    }

    pub fn discovery_poll_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_poll_ms)
    }

    /// Per-reply wait bound; `max_wait_secs = 0` means wait forever.
    pub fn max_wait(&self) -> Option<Duration> {
        match self.max_wait_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Endpoint parameters for the requester side.
    pub fn requester_params(&self) -> EndpointParams {
        self.params(&self.requester)
    }

    /// Endpoint parameters for the replier side.
    pub fn replier_params(&self) -> EndpointParams {
        self.params(&self.replier)
    }

    fn params(&self, profile: &QosProfile) -> EndpointParams {
        let qos = profile.to_qos();
        EndpointParams::new(self.service_name.clone())
            .with_writer_qos(qos)
            .with_reader_qos(qos)
            .with_discovery_poll_interval(self.discovery_poll_interval())
    }
}
