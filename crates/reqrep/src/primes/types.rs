// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload types of the prime calculator service.

use std::fmt;

/// Service name shared by the prime requester and replier.
pub const SERVICE_NAME: &str = "PrimeCalculator";

/// Largest number of primes a single reply may carry.
pub const PRIME_SEQUENCE_MAX_LENGTH: i32 = 1024;

/// Ask for every prime `<= n`, streamed `primes_per_reply` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimeNumberRequest {
    pub n: i32,
    pub primes_per_reply: i32,
}

impl PrimeNumberRequest {
    pub fn new(n: i32, primes_per_reply: i32) -> Self {
        Self { n, primes_per_reply }
    }
}

impl fmt::Display for PrimeNumberRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={}, primes_per_reply={}", self.n, self.primes_per_reply)
    }
}

/// One chunk of primes, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimeNumberReply {
    pub primes: Vec<i32>,
}

impl PrimeNumberReply {
    pub fn new(primes: Vec<i32>) -> Self {
        Self { primes }
    }
}
