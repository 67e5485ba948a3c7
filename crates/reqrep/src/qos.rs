// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS (Quality of Service) policies applied by the in-process transport.
//!
//! Only the policies that shape an inbound buffer are modelled:
//!
//! - **Reliability**: what a writer does when a reader's buffer is full
//! - **History**: `KeepLast(n)` evicts the oldest sample, `KeepAll` keeps
//!   everything within `ResourceLimits`
//! - **ResourceLimits**: `max_samples` bound for `KeepAll`
//!
//! # Examples
//!
//! ```
//! use reqrep::qos::{History, QoS};
//!
//! let qos = QoS::reliable().keep_last(32);
//! assert_eq!(qos.history, History::KeepLast(32));
//! assert!(qos.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

/// Default `max_samples` for `KeepAll` histories.
pub const DEFAULT_MAX_SAMPLES: usize = 100_000;

/// Reliability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Samples that do not fit in a reader's history are dropped silently.
    BestEffort,
    /// A full reader history makes `write` fail instead of losing the sample.
    #[default]
    Reliable,
}

/// History policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep last N samples (bounded queue, drops oldest)
    KeepLast(usize),
    /// Keep all samples within `ResourceLimits::max_samples`.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        Self::KeepAll
    }
}

/// Resource limits for a reader history
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum buffered samples
    pub max_samples: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

/// Collection of policies for a DataWriter or DataReader.
///
/// Validated at endpoint creation (fail-fast on invalid config).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct QoS {
    /// Reliability policy
    pub reliability: Reliability,
    /// History policy
    pub history: History,
    /// Resource limits
    pub resource_limits: ResourceLimits,
}

impl QoS {
    /// Reliable, keep-all.
    pub fn reliable() -> Self {
        Self::default()
    }

    /// Best-effort, keep-all.
    pub fn best_effort() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            ..Self::default()
        }
    }

    /// Profile used by requesters and repliers.
    ///
    /// - Reliable: a reply chunk is never silently lost
    /// - KeepAll: every chunk of a stream stays buffered until taken
    pub fn rpc() -> Self {
        Self::reliable().keep_all()
    }

    #[must_use]
    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    #[must_use]
    pub fn keep_last(mut self, depth: usize) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    #[must_use]
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.resource_limits.max_samples = max_samples;
        self
    }

    /// Number of samples a reader buffer may hold before the history policy applies.
    pub fn capacity(&self) -> usize {
        match self.history {
            History::KeepLast(depth) => depth,
            History::KeepAll => self.resource_limits.max_samples,
        }
    }

    /// Validate QoS configuration
    ///
    /// # Validation Rules
    ///
    /// - History::KeepLast(n) where n > 0
    /// - History::KeepAll requires ResourceLimits.max_samples > 0
    pub fn validate(&self) -> Result<(), String> {
        match self.history {
            History::KeepLast(0) => Err("History::KeepLast(n) requires n > 0".to_string()),
            History::KeepAll if self.resource_limits.max_samples == 0 => {
                Err("History::KeepAll requires ResourceLimits.max_samples > 0".to_string())
            }
            _ => Ok(()),
        }
    }
}
