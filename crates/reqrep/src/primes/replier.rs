// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prime calculator replier.

use crate::error::{Error, Result};
use crate::primes::calculator::{validate_request, PrimeSieve, ReplyChunker};
use crate::primes::types::{PrimeNumberReply, PrimeNumberRequest};
use crate::rpc::{EndpointParams, Replier, ReplyStatus, Request};
use crate::transport::Domain;
use tokio_util::sync::CancellationToken;

/// Serves prime calculation requests one at a time.
pub struct PrimesReplier {
    replier: Replier<PrimeNumberRequest, PrimeNumberReply>,
}

impl PrimesReplier {
    pub fn new(domain: &Domain, params: EndpointParams) -> Result<Self> {
        Ok(Self {
            replier: Replier::new(domain, params)?,
        })
    }

    /// Underlying replier (statistics, matched requesters).
    pub fn replier(&self) -> &Replier<PrimeNumberRequest, PrimeNumberReply> {
        &self.replier
    }

    /// Serve requests until `token` is cancelled.
    ///
    /// Requests still unanswered at cancellation get an ERROR reply.
    pub async fn run(&self, token: &CancellationToken) -> Result<()> {
        tracing::info!("PrimesReplier '{}' spinning...", self.replier.service_name());

        'serve: loop {
            match self.replier.wait_for_requests(1, token).await {
                Ok(()) => {}
                Err(Error::Cancelled) => break,
                Err(e) => return Err(e),
            }

            let mut requests = self.replier.take_requests().into_iter();
            while let Some(request) = requests.next() {
                match self.handle(&request, token).await {
                    Ok(()) => {}
                    Err(Error::Cancelled) => {
                        for pending in requests {
                            self.abort(&pending, &Error::Cancelled);
                        }
                        break 'serve;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to answer request {}: {}",
                            request.correlation_id(),
                            e
                        );
                    }
                }
            }
        }

        tracing::info!(
            "PrimesReplier '{}' stopped ({} requests processed)",
            self.replier.service_name(),
            self.replier.requests_processed()
        );
        Ok(())
    }

    /// Answer one request with its full reply stream.
    ///
    /// An invalid request gets exactly one ERROR reply with no primes. A reply
    /// refused by a full requester history is retried until `token` fires.
    /// A stream that cannot be finished is ended with an ERROR reply, or
    /// abandoned when even that cannot be written.
    pub async fn handle(&self, request: &Request<PrimeNumberRequest>, token: &CancellationToken) -> Result<()> {
        let result = self.stream_primes(request, token).await;
        if let Err(e) = &result {
            self.abort(request, e);
        }
        result
    }

    async fn stream_primes(&self, request: &Request<PrimeNumberRequest>, token: &CancellationToken) -> Result<()> {
        let data = request.data;
        if let Err(e) = validate_request(&data) {
            tracing::warn!("Cannot process request {}: {}", request.correlation_id(), e);
            return self
                .replier
                .send_reply_when_ready(PrimeNumberReply::default(), &request.info, ReplyStatus::Error, token)
                .await;
        }

        tracing::info!("Calculating prime numbers below {}...", data.n);

        // Both values were checked positive above.
        let mut chunker = ReplyChunker::new(data.primes_per_reply as usize);
        for prime in PrimeSieve::new(data.n as usize) {
            if let Some(chunk) = chunker.push(prime as i32) {
                self.replier
                    .send_reply_when_ready(
                        PrimeNumberReply::new(chunk),
                        &request.info,
                        ReplyStatus::InProgress,
                        token,
                    )
                    .await?;

                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                // Let the requester drain between chunks.
                tokio::task::yield_now().await;
            }
        }
        self.replier
            .send_reply_when_ready(
                PrimeNumberReply::new(chunker.finish()),
                &request.info,
                ReplyStatus::Completed,
                token,
            )
            .await?;

        tracing::info!("DONE");
        Ok(())
    }

    /// End the stream of `request` after `cause` stopped it.
    fn abort(&self, request: &Request<PrimeNumberRequest>, cause: &Error) {
        let id = request.correlation_id();
        match self
            .replier
            .send_reply(PrimeNumberReply::default(), &request.info, ReplyStatus::Error)
        {
            Ok(()) => tracing::warn!("Request {} ended with ERROR: {}", id, cause),
            // Already closed, nothing left to end.
            Err(Error::StreamAlreadyTerminal(_)) | Err(Error::UnknownStream(_)) => {}
            Err(e) => {
                if self.replier.abandon_stream(&request.info) {
                    tracing::warn!("Request {} dropped after {}: {}", id, cause, e);
                }
            }
        }
    }
}
