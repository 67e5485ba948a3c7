// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core types for request/reply correlation.

use crate::transport::Guid;
use std::fmt;
use std::time::Instant;

/// Unique identifier of a request, carried by every reply of its stream.
///
/// Combines the GUID of the requester's request writer with a sequence
/// number, so ids never collide without coordination between requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId {
    /// GUID of the DataWriter that sent the request
    pub writer_guid: Guid,
    /// Sequence number assigned by the requester
    pub sequence_number: i64,
}

impl CorrelationId {
    pub fn new(writer_guid: Guid, sequence_number: i64) -> Self {
        Self {
            writer_guid,
            sequence_number,
        }
    }

    /// Create a zero/null identity
    pub fn zero() -> Self {
        Self::new(Guid::zero(), 0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.writer_guid, self.sequence_number)
    }
}

/// Status carried by each reply of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplyStatus {
    /// More replies follow.
    #[default]
    InProgress,
    /// Last reply; the operation succeeded.
    Completed,
    /// Last reply; the operation failed. Its payload is not presented.
    Error,
}

impl ReplyStatus {
    /// `Completed` and `Error` end a stream.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InProgress => "REPLY_IN_PROGRESS",
            Self::Completed => "REPLY_COMPLETED",
            Self::Error => "REPLY_ERROR",
        };
        f.write_str(name)
    }
}

/// Header prepended to request messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestHeader {
    /// Identity of this request (for reply correlation)
    pub request_id: CorrelationId,
}

/// Header prepended to reply messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplyHeader {
    /// Identity of the original request (for correlation)
    pub related_request_id: CorrelationId,
    /// Stream status after this reply
    pub status: ReplyStatus,
    /// Position of this reply in its stream, starting at 0
    pub reply_sequence: u64,
}

/// Request as it travels on the request topic.
#[derive(Debug, Clone)]
pub(crate) struct RequestMessage<T> {
    pub header: RequestHeader,
    pub data: T,
}

/// Reply as it travels on the reply topic.
#[derive(Debug, Clone)]
pub(crate) struct ReplyMessage<T> {
    pub header: ReplyHeader,
    pub data: T,
}

/// Metadata of a request taken by a replier; pass it back to `send_reply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestInfo {
    pub correlation_id: CorrelationId,
    pub received_at: Instant,
}

/// A request taken by a replier.
#[derive(Debug, Clone)]
pub struct Request<T> {
    pub info: RequestInfo,
    pub data: T,
}

impl<T> Request<T> {
    pub fn correlation_id(&self) -> CorrelationId {
        self.info.correlation_id
    }
}

/// Metadata of a reply taken by a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyInfo {
    pub related_request_id: CorrelationId,
    pub status: ReplyStatus,
    pub reply_sequence: u64,
}

/// A reply taken by a requester.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    info: ReplyInfo,
    data: T,
}

impl<T> Reply<T> {
    pub(crate) fn new(info: ReplyInfo, data: T) -> Self {
        Self { info, data }
    }

    pub fn info(&self) -> &ReplyInfo {
        &self.info
    }

    pub fn status(&self) -> ReplyStatus {
        self.info.status
    }

    pub fn related_request_id(&self) -> CorrelationId {
        self.info.related_request_id
    }

    pub fn is_terminal(&self) -> bool {
        self.info.status.is_terminal()
    }

    /// Payload of the reply, `None` for an error reply.
    pub fn data(&self) -> Option<&T> {
        match self.info.status {
            ReplyStatus::Error => None,
            _ => Some(&self.data),
        }
    }

    /// Owned payload of the reply, `None` for an error reply.
    pub fn into_data(self) -> Option<T> {
        match self.info.status {
            ReplyStatus::Error => None,
            _ => Some(self.data),
        }
    }
}
