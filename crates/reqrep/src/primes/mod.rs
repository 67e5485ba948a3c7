// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Streaming prime calculator built on the request/reply layer.
//!
//! The requester asks for every prime `<= n`; the replier runs a sieve and
//! streams the primes `primes_per_reply` at a time as IN_PROGRESS replies,
//! followed by one COMPLETED reply carrying the remainder (possibly empty).
//! A request with `n <= 0` or `primes_per_reply` outside
//! `1..=PRIME_SEQUENCE_MAX_LENGTH` gets a single ERROR reply.

mod calculator;
mod replier;
mod requester;
mod types;

pub use calculator::{validate_request, PrimeSieve, ReplyChunker};
pub use replier::PrimesReplier;
pub use requester::{PrimesRequester, DEFAULT_MAX_WAIT};
pub use types::{PrimeNumberReply, PrimeNumberRequest, PRIME_SEQUENCE_MAX_LENGTH, SERVICE_NAME};
