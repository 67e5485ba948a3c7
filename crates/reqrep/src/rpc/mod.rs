// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/Reply correlation on top of pub/sub.
//!
//! A [`Requester`] sends requests and collects the stream of replies that
//! answers each of them; a [`Replier`] takes requests and answers each one
//! with zero or more `IN_PROGRESS` replies followed by exactly one terminal
//! reply (`COMPLETED` or `ERROR`).
//!
//! # Topic Naming
//!
//! For a service named "PrimeCalculator":
//! - Request topic: `rq/PrimeCalculator`
//! - Reply topic: `rr/PrimeCalculator`
//!
//! # Correlation
//!
//! Each request carries a [`CorrelationId`] (request writer GUID + sequence
//! number). Every reply carries the id of the request it answers plus its
//! position in the reply stream. The requester's reply reader filters on its
//! own writer GUID, so replies addressed to other requesters of the same
//! service never reach it.
//!
//! # Example
//!
//! ```rust,no_run
//! use reqrep::rpc::{EndpointParams, Replier, ReplyStatus, Requester};
//! use reqrep::transport::Domain;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> reqrep::Result<()> {
//! let domain = Domain::new(0)?;
//! let params = EndpointParams::new("Echo");
//! let replier = Replier::<String, String>::new(&domain, params.clone())?;
//! let requester = Requester::<String, String>::new(&domain, params)?;
//!
//! let token = CancellationToken::new();
//! requester.wait_for_matched_replier(&token).await?;
//! requester.send_request("hello".to_string())?;
//!
//! replier.wait_for_requests(1, &token).await?;
//! for request in replier.take_requests() {
//!     replier.send_reply(request.data.clone(), &request.info, ReplyStatus::Completed)?;
//! }
//!
//! requester.wait_for_replies(1, &token).await?;
//! let replies = requester.take_replies();
//! assert_eq!(replies[0].data().map(String::as_str), Some("hello"));
//! # Ok(())
//! # }
//! ```

mod correlation;
mod replier;
mod requester;
mod stream;
mod types;

pub use correlation::{CorrelationIdGenerator, OutstandingRequests, RETIRED_HISTORY};
pub use replier::{Replier, WRITE_RETRY_INTERVAL};
pub use requester::Requester;
pub use stream::{ReplyStream, StreamState};
pub use types::{
    CorrelationId, Reply, ReplyHeader, ReplyInfo, ReplyStatus, Request, RequestHeader, RequestInfo,
};

use crate::qos::QoS;
use std::time::Duration;

/// Poll period used while waiting for a matching endpoint.
pub const DEFAULT_DISCOVERY_POLL: Duration = Duration::from_millis(100);

/// QoS profile used by both sides of a service unless overridden.
///
/// - Reliable: a full reply history fails the write instead of losing a reply
/// - KeepAll: replies of a long stream are never evicted
pub fn rpc_qos() -> QoS {
    QoS::rpc()
}

/// Construction parameters shared by [`Requester`] and [`Replier`].
#[derive(Debug, Clone)]
pub struct EndpointParams {
    /// Service name; topics are derived from it.
    pub service_name: String,
    /// QoS of the endpoint's writer.
    pub writer_qos: QoS,
    /// QoS of the endpoint's reader.
    pub reader_qos: QoS,
    /// Poll period of `wait_for_matched_replier`.
    pub discovery_poll_interval: Duration,
}

impl EndpointParams {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            writer_qos: rpc_qos(),
            reader_qos: rpc_qos(),
            discovery_poll_interval: DEFAULT_DISCOVERY_POLL,
        }
    }

    pub fn with_writer_qos(mut self, qos: QoS) -> Self {
        self.writer_qos = qos;
        self
    }

    pub fn with_reader_qos(mut self, qos: QoS) -> Self {
        self.reader_qos = qos;
        self
    }

    pub fn with_discovery_poll_interval(mut self, interval: Duration) -> Self {
        self.discovery_poll_interval = interval;
        self
    }

    /// `rq/<service>`
    pub fn request_topic(&self) -> String {
        format!("rq/{}", self.service_name)
    }

    /// `rr/<service>`
    pub fn reply_topic(&self) -> String {
        format!("rr/{}", self.service_name)
    }
}

#[cfg(test)]
mod tests;
