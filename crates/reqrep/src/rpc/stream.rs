// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply stream state machine.
//!
//! ```text
//! AwaitingFirstReply --IN_PROGRESS--> InProgress --IN_PROGRESS--> InProgress
//!        |                                |
//!        +--COMPLETED/ERROR--> Completed | Error  <--COMPLETED/ERROR--+
//! ```
//!
//! Replies are accepted in delivery order. The reply sequence stamped by the
//! replier is only used to reject redeliveries and to report gaps; nothing is
//! reordered.

use crate::error::{Error, Result};
use crate::rpc::types::{CorrelationId, ReplyStatus};
use std::time::{Duration, Instant};

/// State of one reply stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Request sent, nothing received yet.
    AwaitingFirstReply,
    /// At least one IN_PROGRESS reply received.
    InProgress,
    /// Terminated by a COMPLETED reply.
    Completed,
    /// Terminated by an ERROR reply.
    Error,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Per-request progress of the replies received so far.
#[derive(Debug, Clone)]
pub struct ReplyStream {
    id: CorrelationId,
    state: StreamState,
    replies_received: u64,
    last_sequence: Option<u64>,
    opened_at: Instant,
}

impl ReplyStream {
    /// New stream in `AwaitingFirstReply`.
    pub fn new(id: CorrelationId) -> Self {
        Self {
            id,
            state: StreamState::AwaitingFirstReply,
            replies_received: 0,
            last_sequence: None,
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn replies_received(&self) -> u64 {
        self.replies_received
    }

    /// Time since the request was sent.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Advance the stream with a reply of `status` stamped `sequence`.
    ///
    /// Rejected replies leave the stream unchanged:
    /// - any reply on a terminal stream: `StreamAlreadyTerminal`
    /// - a sequence not above the last accepted one: `DuplicateReply`
    pub fn accept(&mut self, status: ReplyStatus, sequence: u64) -> Result<StreamState> {
        if self.state.is_terminal() {
            return Err(Error::StreamAlreadyTerminal(self.id));
        }

        if let Some(last) = self.last_sequence {
            if sequence <= last {
                return Err(Error::DuplicateReply {
                    id: self.id,
                    sequence,
                });
            }
            if sequence > last + 1 {
                tracing::warn!(
                    "Stream {}: replies {}..{} missing",
                    self.id,
                    last + 1,
                    sequence
                );
            }
        } else if sequence > 0 {
            tracing::warn!("Stream {}: first {} replies missing", self.id, sequence);
        }

        self.last_sequence = Some(sequence);
        self.replies_received += 1;
        self.state = match status {
            ReplyStatus::InProgress => StreamState::InProgress,
            ReplyStatus::Completed => StreamState::Completed,
            ReplyStatus::Error => StreamState::Error,
        };

        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Guid;

    fn stream() -> ReplyStream {
        ReplyStream::new(CorrelationId::new(Guid::zero(), 1))
    }

    #[test]
    fn starts_awaiting_first_reply() {
        let stream = stream();
        assert_eq!(stream.state(), StreamState::AwaitingFirstReply);
        assert_eq!(stream.replies_received(), 0);
    }

    #[test]
    fn in_progress_then_completed() {
        let mut stream = stream();

        assert_eq!(
            stream.accept(ReplyStatus::InProgress, 0).unwrap(),
            StreamState::InProgress
        );
        assert_eq!(
            stream.accept(ReplyStatus::InProgress, 1).unwrap(),
            StreamState::InProgress
        );
        assert_eq!(
            stream.accept(ReplyStatus::Completed, 2).unwrap(),
            StreamState::Completed
        );
        assert_eq!(stream.replies_received(), 3);
    }

    #[test]
    fn immediate_error() {
        let mut stream = stream();
        assert_eq!(
            stream.accept(ReplyStatus::Error, 0).unwrap(),
            StreamState::Error
        );
        assert!(stream.state().is_terminal());
    }

    #[test]
    fn reply_after_terminal_is_rejected() {
        let mut stream = stream();
        stream.accept(ReplyStatus::Completed, 0).unwrap();

        let err = stream.accept(ReplyStatus::InProgress, 1).unwrap_err();
        assert!(matches!(err, Error::StreamAlreadyTerminal(_)));
        assert_eq!(stream.state(), StreamState::Completed);
        assert_eq!(stream.replies_received(), 1);
    }

    #[test]
    fn redelivery_is_rejected() {
        let mut stream = stream();
        stream.accept(ReplyStatus::InProgress, 0).unwrap();
        stream.accept(ReplyStatus::InProgress, 1).unwrap();

        let err = stream.accept(ReplyStatus::InProgress, 1).unwrap_err();
        assert!(matches!(err, Error::DuplicateReply { sequence: 1, .. }));
        assert_eq!(stream.replies_received(), 2);
    }

    #[test]
    fn gap_is_accepted_in_delivery_order() {
        let mut stream = stream();
        stream.accept(ReplyStatus::InProgress, 0).unwrap();
        assert_eq!(
            stream.accept(ReplyStatus::Completed, 5).unwrap(),
            StreamState::Completed
        );
    }
}
