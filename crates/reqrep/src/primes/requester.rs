// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prime calculator requester.

use crate::error::{Error, Result};
use crate::primes::types::{PrimeNumberReply, PrimeNumberRequest};
use crate::rpc::{CorrelationId, EndpointParams, Reply, ReplyStatus, Requester};
use crate::transport::Domain;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default bound on the wait for each reply.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(20);

/// Sends one prime calculation request and gathers its reply stream.
pub struct PrimesRequester {
    requester: Requester<PrimeNumberRequest, PrimeNumberReply>,
    max_wait: Option<Duration>,
}

impl PrimesRequester {
    pub fn new(domain: &Domain, params: EndpointParams) -> Result<Self> {
        Ok(Self {
            requester: Requester::new(domain, params)?,
            max_wait: Some(DEFAULT_MAX_WAIT),
        })
    }

    /// Bound on the wait for each reply; `None` waits until cancelled.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Underlying requester.
    pub fn requester(&self) -> &Requester<PrimeNumberRequest, PrimeNumberReply> {
        &self.requester
    }

    /// Ask for every prime `<= n` and collect them in delivery order.
    ///
    /// `on_reply` sees every reply of the stream, including the terminal one.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `token` fires
    /// - `Timeout` if no reply arrives within the configured bound
    /// - `ReplierFailed` if the stream ends with an ERROR reply
    pub async fn run<F>(
        &self,
        n: i32,
        primes_per_reply: i32,
        token: &CancellationToken,
        mut on_reply: F,
    ) -> Result<Vec<i32>>
    where
        F: FnMut(&Reply<PrimeNumberReply>),
    {
        self.requester.wait_for_matched_replier(token).await?;

        let request = PrimeNumberRequest::new(n, primes_per_reply);
        let id = self.requester.send_request(request)?;
        tracing::info!("Requested primes up to {} ({})", n, id);

        let result = self.collect(id, token, &mut on_reply).await;
        if result.is_err() {
            self.requester.cancel_request(&id);
        }
        result
    }

    async fn collect<F>(&self, id: CorrelationId, token: &CancellationToken, on_reply: &mut F) -> Result<Vec<i32>>
    where
        F: FnMut(&Reply<PrimeNumberReply>),
    {
        let mut primes = Vec::new();
        loop {
            self.wait_for_reply(token).await?;

            for reply in self.requester.take_replies() {
                if reply.related_request_id() != id {
                    continue;
                }
                on_reply(&reply);

                if let Some(data) = reply.data() {
                    primes.extend_from_slice(&data.primes);
                }
                match reply.status() {
                    ReplyStatus::InProgress => {}
                    ReplyStatus::Completed => return Ok(primes),
                    ReplyStatus::Error => return Err(Error::ReplierFailed(id)),
                }
            }
        }
    }

    async fn wait_for_reply(&self, token: &CancellationToken) -> Result<()> {
        match self.max_wait {
            None => self.requester.wait_for_replies(1, token).await,
            Some(max_wait) => {
                tokio::time::timeout(max_wait, self.requester.wait_for_replies(1, token))
                    .await
                    .map_err(|_| Error::Timeout(max_wait))?
            }
        }
    }
}
