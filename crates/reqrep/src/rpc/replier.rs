// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Replier: takes requests and answers each one with a reply stream.

use crate::error::{Error, Result};
use crate::rpc::correlation::RetiredIds;
use crate::rpc::types::{
    CorrelationId, ReplyHeader, ReplyMessage, ReplyStatus, Request, RequestInfo, RequestMessage,
};
use crate::rpc::EndpointParams;
use crate::transport::{DataReader, DataWriter, Domain, Message};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Pause between attempts while the requester's reply history is full.
pub const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Streams the replier has opened but not terminated yet.
#[derive(Default)]
struct OpenStreams {
    /// correlation id -> sequence of the next reply
    next_sequence: HashMap<CorrelationId, u64>,
    retired: RetiredIds,
}

/// Receives requests of type `Req` and sends replies of type `Rep`.
///
/// Every taken request opens a reply stream. `send_reply` may be called any
/// number of times with `ReplyStatus::InProgress` and exactly once with a
/// terminal status; after that the stream refuses further replies.
pub struct Replier<Req: Message, Rep: Message> {
    /// Service name
    service_name: String,

    /// Reader for receiving requests
    request_reader: DataReader<RequestMessage<Req>>,

    /// Writer for sending replies
    reply_writer: DataWriter<ReplyMessage<Rep>>,

    streams: Mutex<OpenStreams>,

    /// Statistics
    requests_processed: AtomicU64,
}

impl<Req: Message, Rep: Message> Replier<Req, Rep> {
    /// Create a replier for `params.service_name` on `domain`.
    pub fn new(domain: &Domain, params: EndpointParams) -> Result<Self> {
        let request_topic = params.request_topic();
        let request_reader =
            domain.create_reader::<RequestMessage<Req>>(&request_topic, params.reader_qos)?;

        let reply_topic = params.reply_topic();
        let reply_writer =
            domain.create_writer::<ReplyMessage<Rep>>(&reply_topic, params.writer_qos)?;

        tracing::info!("Replier for '{}' started", params.service_name);
        tracing::debug!("  Request topic: {}", request_topic);
        tracing::debug!("  Reply topic: {}", reply_topic);

        Ok(Self {
            service_name: params.service_name,
            request_reader,
            reply_writer,
            streams: Mutex::new(OpenStreams::default()),
            requests_processed: AtomicU64::new(0),
        })
    }

    /// Get the service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Number of requesters currently reading the reply topic.
    pub fn matched_requester_count(&self) -> usize {
        self.reply_writer.matched_subscriptions()
    }

    /// Suspend until at least `min_count` requests are buffered.
    ///
    /// On `Cancelled` the buffered requests stay available to `take_requests`.
    pub async fn wait_for_requests(&self, min_count: usize, token: &CancellationToken) -> Result<()> {
        self.request_reader.wait_for_samples(min_count, token).await
    }

    /// Drain the buffered requests, opening a reply stream for each.
    ///
    /// A request whose id already has a stream (open or ended) is a redelivery
    /// and is dropped.
    pub fn take_requests(&self) -> Vec<Request<Req>> {
        let samples = self.request_reader.take();
        if samples.is_empty() {
            return Vec::new();
        }

        let received_at = Instant::now();
        let mut streams = self.streams.lock();
        let mut requests = Vec::with_capacity(samples.len());
        for sample in samples {
            let id = sample.header.request_id;
            if streams.next_sequence.contains_key(&id) || streams.retired.contains(&id) {
                tracing::warn!("'{}': dropping duplicate request {}", self.service_name, id);
                continue;
            }
            streams.next_sequence.insert(id, 0);
            self.requests_processed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("'{}': received request {}", self.service_name, id);

            requests.push(Request {
                info: RequestInfo {
                    correlation_id: id,
                    received_at,
                },
                data: sample.data,
            });
        }
        requests
    }

    /// Wait up to `max_wait` for `min_count` requests, then take what arrived.
    pub async fn receive_requests(&self, min_count: usize, max_wait: Duration) -> Result<Vec<Request<Req>>> {
        let token = CancellationToken::new();
        match tokio::time::timeout(max_wait, self.wait_for_requests(min_count, &token)).await {
            Ok(Ok(())) | Err(_) => Ok(self.take_requests()),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Publish one reply on the stream of `info`.
    ///
    /// A terminal `status` ends the stream. Errors:
    /// - `StreamAlreadyTerminal`: the stream already received its terminal reply
    /// - `UnknownStream`: `info` does not come from this replier's `take_requests`
    /// - transport errors from the write; the stream stays open and the reply
    ///   may be retried
    pub fn send_reply(&self, data: Rep, info: &RequestInfo, status: ReplyStatus) -> Result<()> {
        let id = info.correlation_id;

        // Held across the write so replies of one stream keep their order.
        let mut streams = self.streams.lock();
        let Some(&sequence) = streams.next_sequence.get(&id) else {
            if streams.retired.contains(&id) {
                return Err(Error::StreamAlreadyTerminal(id));
            }
            return Err(Error::UnknownStream(id));
        };

        let message = ReplyMessage {
            header: ReplyHeader {
                related_request_id: id,
                status,
                reply_sequence: sequence,
            },
            data,
        };
        let delivered = self.reply_writer.write(&message)?;
        if delivered == 0 {
            tracing::debug!("'{}': reply {} for {} had no reader", self.service_name, sequence, id);
        }

        if status.is_terminal() {
            streams.next_sequence.remove(&id);
            streams.retired.insert(id);
            tracing::debug!(
                "'{}': stream {} closed with {} after {} replies",
                self.service_name,
                id,
                status,
                sequence + 1
            );
        } else if let Some(next) = streams.next_sequence.get_mut(&id) {
            *next = sequence + 1;
        }

        Ok(())
    }

    /// Publish one reply, waiting out a full requester history.
    ///
    /// `ResourceLimitExceeded` leaves the stream untouched, so the same reply
    /// is retried every `WRITE_RETRY_INTERVAL` until it is accepted or
    /// `token` is cancelled. Any other error is returned at once.
    pub async fn send_reply_when_ready(
        &self,
        data: Rep,
        info: &RequestInfo,
        status: ReplyStatus,
        token: &CancellationToken,
    ) -> Result<()> {
        loop {
            match self.send_reply(data.clone(), info, status) {
                Err(Error::ResourceLimitExceeded(reason)) => {
                    tracing::trace!(
                        "'{}': reply for {} blocked ({}), retrying",
                        self.service_name,
                        info.correlation_id,
                        reason
                    );
                }
                result => return result,
            }

            tokio::select! {
                _ = tokio::time::sleep(WRITE_RETRY_INTERVAL) => {}
                _ = token.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    /// Close the stream of `info` without publishing a terminal reply.
    ///
    /// For streams whose terminal reply cannot be delivered. Later replies on
    /// the stream fail with `StreamAlreadyTerminal`. Returns `false` if the
    /// stream was not open.
    pub fn abandon_stream(&self, info: &RequestInfo) -> bool {
        let id = info.correlation_id;
        let mut streams = self.streams.lock();
        if streams.next_sequence.remove(&id).is_none() {
            return false;
        }
        streams.retired.insert(id);
        drop(streams);

        tracing::warn!("'{}': stream {} abandoned without a terminal reply", self.service_name, id);
        true
    }

    /// Number of streams awaiting their terminal reply.
    pub fn open_streams(&self) -> usize {
        self.streams.lock().next_sequence.len()
    }

    /// Total requests taken since creation.
    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.load(Ordering::Relaxed)
    }
}
