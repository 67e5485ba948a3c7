// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Correlation id generation and reply-to-request matching.

use crate::error::{Error, Result};
use crate::rpc::stream::{ReplyStream, StreamState};
use crate::rpc::types::{CorrelationId, ReplyHeader};
use crate::transport::Guid;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};

/// How many finished stream ids are remembered to classify late replies.
pub const RETIRED_HISTORY: usize = 64;

/// Hands out correlation ids for one requester.
///
/// Ids are `(writer GUID, n)` with `n` starting at 1 and increasing by one
/// per request.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    guid: Guid,
    next: AtomicI64,
}

impl CorrelationIdGenerator {
    pub fn new(guid: Guid) -> Self {
        Self {
            guid,
            next: AtomicI64::new(1),
        }
    }

    pub fn next_id(&self) -> CorrelationId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId::new(self.guid, seq)
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }
}

/// Bounded FIFO of ids whose stream has ended.
#[derive(Debug, Default)]
pub(crate) struct RetiredIds {
    ids: VecDeque<CorrelationId>,
}

impl RetiredIds {
    pub(crate) fn insert(&mut self, id: CorrelationId) {
        if self.ids.len() >= RETIRED_HISTORY {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
    }

    pub(crate) fn contains(&self, id: &CorrelationId) -> bool {
        self.ids.contains(id)
    }
}

/// Reply streams of the requests a requester is still waiting on.
#[derive(Debug, Default)]
pub struct OutstandingRequests {
    streams: HashMap<CorrelationId, ReplyStream>,
    retired: RetiredIds,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a stream for a request that is about to be sent.
    pub fn register(&mut self, id: CorrelationId) {
        self.streams.insert(id, ReplyStream::new(id));
    }

    /// True if `id` belongs to an outstanding request.
    pub fn matches(&self, id: &CorrelationId) -> bool {
        self.streams.contains_key(id)
    }

    pub fn state(&self, id: &CorrelationId) -> Option<StreamState> {
        self.streams.get(id).map(ReplyStream::state)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Route an inbound reply to its stream.
    ///
    /// A terminal reply retires the stream. Errors:
    /// - `UnknownStream`: no outstanding request with that id (foreign or
    ///   abandoned request)
    /// - `StreamAlreadyTerminal`: the stream already ended
    /// - `DuplicateReply`: redelivered reply
    pub fn accept(&mut self, header: &ReplyHeader) -> Result<StreamState> {
        let id = header.related_request_id;

        let Some(stream) = self.streams.get_mut(&id) else {
            if self.retired.contains(&id) {
                return Err(Error::StreamAlreadyTerminal(id));
            }
            return Err(Error::UnknownStream(id));
        };

        let state = stream.accept(header.status, header.reply_sequence)?;
        if state.is_terminal() {
            self.retire(&id);
        }
        Ok(state)
    }

    /// Stop tracking `id`; later replies are reported as `StreamAlreadyTerminal`.
    pub fn retire(&mut self, id: &CorrelationId) -> Option<ReplyStream> {
        let stream = self.streams.remove(id)?;
        self.retired.insert(*id);
        Some(stream)
    }

    /// Forget `id` without remembering it (request never left the requester).
    pub fn forget(&mut self, id: &CorrelationId) {
        self.streams.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::ReplyStatus;

    fn header(id: CorrelationId, status: ReplyStatus, seq: u64) -> ReplyHeader {
        ReplyHeader {
            related_request_id: id,
            status,
            reply_sequence: seq,
        }
    }

    #[test]
    fn generator_is_monotonic_per_guid() {
        let guid = Guid::new([9; 12], [0, 0, 1, 3]);
        let ids = CorrelationIdGenerator::new(guid);

        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a.writer_guid, guid);
        assert_eq!(a.sequence_number, 1);
        assert_eq!(b.sequence_number, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn generators_with_distinct_guids_never_collide() {
        let a = CorrelationIdGenerator::new(Guid::new([1; 12], [0, 0, 1, 3]));
        let b = CorrelationIdGenerator::new(Guid::new([1; 12], [0, 0, 2, 3]));
        assert_ne!(a.next_id(), b.next_id());
    }

    #[test]
    fn unmatched_reply_is_unknown() {
        let mut outstanding = OutstandingRequests::new();
        let id = CorrelationId::new(Guid::zero(), 5);

        assert!(!outstanding.matches(&id));
        let err = outstanding
            .accept(&header(id, ReplyStatus::InProgress, 0))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownStream(_)));
    }

    #[test]
    fn terminal_reply_retires_stream() {
        let mut outstanding = OutstandingRequests::new();
        let id = CorrelationId::new(Guid::zero(), 1);
        outstanding.register(id);

        assert_eq!(outstanding.state(&id), Some(StreamState::AwaitingFirstReply));
        outstanding
            .accept(&header(id, ReplyStatus::InProgress, 0))
            .unwrap();
        assert_eq!(
            outstanding
                .accept(&header(id, ReplyStatus::Completed, 1))
                .unwrap(),
            StreamState::Completed
        );
        assert!(outstanding.is_empty());

        let err = outstanding
            .accept(&header(id, ReplyStatus::InProgress, 2))
            .unwrap_err();
        assert!(matches!(err, Error::StreamAlreadyTerminal(_)));
    }

    #[test]
    fn retired_history_is_bounded() {
        let mut retired = RetiredIds::default();
        for seq in 0..(RETIRED_HISTORY as i64 + 1) {
            retired.insert(CorrelationId::new(Guid::zero(), seq));
        }
        assert!(!retired.contains(&CorrelationId::new(Guid::zero(), 0)));
        assert!(retired.contains(&CorrelationId::new(Guid::zero(), RETIRED_HISTORY as i64)));
    }

    #[test]
    fn forget_does_not_remember() {
        let mut outstanding = OutstandingRequests::new();
        let id = CorrelationId::new(Guid::zero(), 1);
        outstanding.register(id);
        outstanding.forget(&id);

        let err = outstanding
            .accept(&header(id, ReplyStatus::Completed, 0))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownStream(_)));
    }
}
