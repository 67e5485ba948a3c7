// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prime computation and reply chunking.

use crate::error::{Error, Result};
use crate::primes::types::{PrimeNumberRequest, PRIME_SEQUENCE_MAX_LENGTH};
use bit_vec::BitVec;

/// Check a request before any computation.
///
/// # Validation Rules
///
/// - `n > 0`
/// - `0 < primes_per_reply <= PRIME_SEQUENCE_MAX_LENGTH`
pub fn validate_request(request: &PrimeNumberRequest) -> Result<()> {
    if request.n <= 0 {
        return Err(Error::InvalidRequest(format!(
            "n must be positive (got {})",
            request.n
        )));
    }
    if request.primes_per_reply <= 0 || request.primes_per_reply > PRIME_SEQUENCE_MAX_LENGTH {
        return Err(Error::InvalidRequest(format!(
            "primes_per_reply must be in 1..={} (got {})",
            PRIME_SEQUENCE_MAX_LENGTH, request.primes_per_reply
        )));
    }
    Ok(())
}

/// Sieve of Eratosthenes over `0..=n`, yielding primes in ascending order.
///
/// Multiples of a prime `p` are crossed out when `p` is reached, starting at
/// `p * p`; past `sqrt(n)` the remaining candidates are only scanned.
///
/// One bit per candidate: `n = i32::MAX` needs 256 MiB.
pub struct PrimeSieve {
    composite: BitVec,
    next: usize,
}

impl PrimeSieve {
    pub fn new(n: usize) -> Self {
        Self {
            composite: BitVec::from_elem(n.saturating_add(1), false),
            next: 2,
        }
    }

    fn limit(&self) -> usize {
        self.composite.len() - 1
    }
}

impl Iterator for PrimeSieve {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let n = self.limit();
        while self.next <= n {
            let candidate = self.next;
            self.next += 1;

            if self.composite.get(candidate).unwrap_or(true) {
                continue;
            }
            if candidate <= n / candidate {
                for multiple in (candidate * candidate..=n).step_by(candidate) {
                    self.composite.set(multiple, true);
                }
            }
            return Some(candidate);
        }
        None
    }
}

/// Groups primes into reply-sized chunks.
#[derive(Debug)]
pub struct ReplyChunker {
    primes_per_reply: usize,
    chunk: Vec<i32>,
}

impl ReplyChunker {
    /// `primes_per_reply` of 0 is treated as 1.
    pub fn new(primes_per_reply: usize) -> Self {
        let primes_per_reply = primes_per_reply.max(1);
        Self {
            primes_per_reply,
            chunk: Vec::with_capacity(primes_per_reply),
        }
    }

    /// Add a prime; returns a full chunk to send as IN_PROGRESS.
    pub fn push(&mut self, prime: i32) -> Option<Vec<i32>> {
        self.chunk.push(prime);
        if self.chunk.len() == self.primes_per_reply {
            let full = std::mem::replace(&mut self.chunk, Vec::with_capacity(self.primes_per_reply));
            return Some(full);
        }
        None
    }

    /// Remaining primes (possibly none) for the COMPLETED reply.
    pub fn finish(self) -> Vec<i32> {
        self.chunk
    }
}
