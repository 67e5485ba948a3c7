// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Requester: sends requests and collects their reply streams.

use crate::error::{Error, Result};
use crate::rpc::correlation::{CorrelationIdGenerator, OutstandingRequests};
use crate::rpc::stream::StreamState;
use crate::rpc::types::{
    CorrelationId, Reply, ReplyInfo, ReplyMessage, RequestHeader, RequestMessage,
};
use crate::rpc::EndpointParams;
use crate::transport::{DataReader, DataWriter, Domain, Guid, Message};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends requests of type `Req` to a service and receives replies of type `Rep`.
///
/// Several requests may be outstanding at once; replies of each stream are
/// returned in the order they were delivered, tagged with the id of the
/// request they answer.
///
/// # Example
///
/// ```rust,no_run
/// use reqrep::rpc::{EndpointParams, Requester};
/// use reqrep::transport::Domain;
/// use std::time::Duration;
///
/// # async fn example() -> reqrep::Result<()> {
/// let domain = Domain::new(0)?;
/// let requester = Requester::<u32, u32>::new(&domain, EndpointParams::new("square"))?;
///
/// let id = requester.send_request(12)?;
/// for reply in requester.receive_replies(1, Duration::from_secs(5)).await? {
///     assert_eq!(reply.related_request_id(), id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Requester<Req: Message, Rep: Message> {
    /// Service name
    service_name: String,

    /// Writer for sending requests
    request_writer: DataWriter<RequestMessage<Req>>,

    /// Reader for replies addressed to this requester only
    reply_reader: DataReader<ReplyMessage<Rep>>,

    /// Correlation id source (request writer GUID + counter)
    ids: CorrelationIdGenerator,

    /// Open reply streams and the replies accepted for them
    inbox: Mutex<Inbox<Rep>>,

    discovery_poll_interval: Duration,
}

/// Replies that passed stream validation but were not taken yet.
struct Inbox<Rep> {
    outstanding: OutstandingRequests,
    accepted: VecDeque<Reply<Rep>>,
}

impl<Req: Message, Rep: Message> Requester<Req, Rep> {
    /// Create a requester for `params.service_name` on `domain`.
    pub fn new(domain: &Domain, params: EndpointParams) -> Result<Self> {
        let request_topic = params.request_topic();
        let request_writer =
            domain.create_writer::<RequestMessage<Req>>(&request_topic, params.writer_qos)?;

        // Replies for other requesters of the same service are filtered out
        // before they reach our history.
        let own_guid = request_writer.guid();
        let reply_topic = params.reply_topic();
        let reply_reader = domain.create_filtered_reader::<ReplyMessage<Rep>, _>(
            &reply_topic,
            params.reader_qos,
            move |reply| reply.header.related_request_id.writer_guid == own_guid,
        )?;

        tracing::info!(
            "Requester for '{}' created (writer {})",
            params.service_name,
            own_guid
        );
        tracing::debug!("  Request topic: {}", request_topic);
        tracing::debug!("  Reply topic: {}", reply_topic);

        Ok(Self {
            service_name: params.service_name,
            request_writer,
            reply_reader,
            ids: CorrelationIdGenerator::new(own_guid),
            inbox: Mutex::new(Inbox {
                outstanding: OutstandingRequests::new(),
                accepted: VecDeque::new(),
            }),
            discovery_poll_interval: params.discovery_poll_interval,
        })
    }

    /// Get the service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// GUID of the request writer; every correlation id of this requester carries it.
    pub fn guid(&self) -> Guid {
        self.ids.guid()
    }

    /// Number of repliers currently reading the request topic.
    pub fn matched_replier_count(&self) -> usize {
        self.request_writer.matched_subscriptions()
    }

    /// Poll until at least one replier is matched.
    pub async fn wait_for_matched_replier(&self, token: &CancellationToken) -> Result<()> {
        loop {
            if self.matched_replier_count() > 0 {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(self.discovery_poll_interval) => {}
                _ = token.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    /// Publish a request and open its reply stream.
    ///
    /// Fails with `NoMatchedReplier` when nobody reads the request topic.
    pub fn send_request(&self, data: Req) -> Result<CorrelationId> {
        if self.matched_replier_count() == 0 {
            return Err(Error::NoMatchedReplier(self.service_name.clone()));
        }

        let id = self.ids.next_id();
        // Registered before the write so an immediate reply is never orphaned.
        self.inbox.lock().outstanding.register(id);

        let message = RequestMessage {
            header: RequestHeader { request_id: id },
            data,
        };
        if let Err(e) = self.request_writer.write(&message) {
            self.inbox.lock().outstanding.forget(&id);
            return Err(e);
        }

        tracing::debug!("'{}': sent request {}", self.service_name, id);
        Ok(id)
    }

    /// Suspend until at least `min_count` replies for outstanding requests
    /// are ready to be taken.
    ///
    /// Replies that `take_replies` would discard (late, duplicate, or for an
    /// abandoned request) do not count. On `Cancelled` the accepted replies
    /// stay available to `take_replies`.
    pub async fn wait_for_replies(&self, min_count: usize, token: &CancellationToken) -> Result<()> {
        let min_count = min_count.max(1);
        loop {
            if self.accept_arrivals() >= min_count {
                return Ok(());
            }
            // Wakes on any arrival; rejected ones are drained by the next pass.
            self.reply_reader.wait_for_samples(1, token).await?;
        }
    }

    /// Take every accepted reply, in delivery order.
    ///
    /// A terminal reply closes its stream; late, duplicate and unknown
    /// replies are discarded.
    pub fn take_replies(&self) -> Vec<Reply<Rep>> {
        self.accept_arrivals();
        self.inbox.lock().accepted.drain(..).collect()
    }

    /// Move buffered samples through stream validation into the inbox.
    ///
    /// Returns the number of accepted replies waiting to be taken.
    fn accept_arrivals(&self) -> usize {
        let samples = self.reply_reader.take();
        let mut inbox = self.inbox.lock();

        for sample in samples {
            let header = sample.header;
            match inbox.outstanding.accept(&header) {
                Ok(state) => {
                    if state.is_terminal() {
                        tracing::debug!(
                            "'{}': stream {} ended with {}",
                            self.service_name,
                            header.related_request_id,
                            header.status
                        );
                    }
                    let info = ReplyInfo {
                        related_request_id: header.related_request_id,
                        status: header.status,
                        reply_sequence: header.reply_sequence,
                    };
                    inbox.accepted.push_back(Reply::new(info, sample.data));
                }
                Err(Error::UnknownStream(id)) => {
                    tracing::trace!("'{}': ignoring reply for unknown request {}", self.service_name, id);
                }
                Err(e) => {
                    tracing::warn!("'{}': discarding reply: {}", self.service_name, e);
                }
            }
        }
        inbox.accepted.len()
    }

    /// Wait up to `max_wait` for `min_count` replies, then take what arrived.
    ///
    /// A timeout is not an error: the result is simply shorter (possibly empty).
    pub async fn receive_replies(&self, min_count: usize, max_wait: Duration) -> Result<Vec<Reply<Rep>>> {
        let token = CancellationToken::new();
        match tokio::time::timeout(max_wait, self.wait_for_replies(min_count, &token)).await {
            Ok(Ok(())) | Err(_) => Ok(self.take_replies()),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Abandon an outstanding request. Its untaken and in-flight replies are discarded.
    ///
    /// Returns `false` if the request was not outstanding.
    pub fn cancel_request(&self, id: &CorrelationId) -> bool {
        let mut inbox = self.inbox.lock();
        let cancelled = inbox.outstanding.retire(id).is_some();
        if cancelled {
            inbox.accepted.retain(|reply| reply.related_request_id() != *id);
        }
        drop(inbox);
        if cancelled {
            tracing::debug!("'{}': request {} abandoned", self.service_name, id);
        }
        cancelled
    }

    /// State of an outstanding request's stream, `None` once it ended.
    pub fn stream_state(&self, id: &CorrelationId) -> Option<StreamState> {
        self.inbox.lock().outstanding.state(id)
    }

    /// Number of requests whose stream has not ended.
    pub fn outstanding_requests(&self) -> usize {
        self.inbox.lock().outstanding.len()
    }
}
