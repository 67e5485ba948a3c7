// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/Reply correlation over publish/subscribe
//!
//! Turns a topic-based pub/sub transport into a request/reply channel where
//! one request may be answered by a stream of replies.
//!
//! # Features
//!
//! - **Correlation**: every reply carries the id of the request it answers
//! - **Reply streams**: zero or more IN_PROGRESS replies, then exactly one
//!   COMPLETED or ERROR reply
//! - **Cancellation**: every suspension point takes a `CancellationToken`
//! - **In-process transport**: explicit `Domain` handle with typed topics
//!
//! # Quick Start
//!
//! ```bash
//! # Requester and replier in one process
//! reqrep-primes --requester --replier -n 100 -p 10
//!
//! # Using config file
//! reqrep-primes --requester --replier -n 100 --config primes.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! service_name = "PrimeCalculator"
//! domain_id = 0
//! max_wait_secs = 20
//!
//! [replier]
//! reliability = "reliable"
//! max_samples = 10000
//! ```

pub mod config;
pub mod error;
pub mod primes;
pub mod qos;
pub mod rpc;
pub mod transport;

pub use config::{ConfigError, QosProfile, ServiceConfig};
pub use error::{Error, Result};
pub use qos::{History, QoS, Reliability, ResourceLimits};
pub use rpc::{
    CorrelationId, EndpointParams, Replier, Reply, ReplyStatus, Request, RequestInfo, Requester,
    StreamState,
};
pub use transport::{DataReader, DataWriter, Domain, Guid};
