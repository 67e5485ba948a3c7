// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for request/reply operations.

use crate::config::ConfigError;
use crate::rpc::CorrelationId;
use std::time::Duration;
use thiserror::Error;

/// Result type for request/reply operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the transport, the correlation layer and the services
/// built on top of it.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Correlation / protocol errors
    // ========================================================================
    /// No replier is currently matched on the service's request topic.
    #[error("No replier matched for service '{0}'")]
    NoMatchedReplier(String),

    /// Request payload rejected by the replier's validation.
    ///
    /// Never crosses the replier boundary: it is turned into a single
    /// `ReplyStatus::Error` reply.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A reply arrived (or was sent) after its stream reached a terminal status.
    #[error("Reply stream {0} already reached a terminal status")]
    StreamAlreadyTerminal(CorrelationId),

    /// A reply was delivered twice (reply sequence not increasing).
    #[error("Duplicate reply #{sequence} on stream {id}")]
    DuplicateReply { id: CorrelationId, sequence: u64 },

    /// No reply stream is open for this correlation id.
    #[error("Unknown reply stream {0}")]
    UnknownStream(CorrelationId),

    /// The replier terminated the stream with `ReplyStatus::Error`.
    #[error("Replier returned an error for request {0}")]
    ReplierFailed(CorrelationId),

    // ========================================================================
    // Suspension point errors
    // ========================================================================
    /// The caller's cancellation token fired while waiting.
    #[error("Operation cancelled")]
    Cancelled,

    /// A bounded wait elapsed without the expected data.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// Domain ID out of range (0-232).
    #[error("Invalid domain_id: {0} (must be 0-232)")]
    InvalidDomainId(u32),

    /// Topic already registered with another message type.
    #[error("Type mismatch on topic '{topic}': registered as {registered}, requested {requested}")]
    TypeMismatch {
        topic: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// Reader history is full and the writer is reliable.
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// The domain handle was disposed.
    #[error("Domain {0} has been disposed")]
    DomainClosed(u32),

    // ========================================================================
    // Configuration errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// True for errors raised at a suspension point because the caller gave up.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
