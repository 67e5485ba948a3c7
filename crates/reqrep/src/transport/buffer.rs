// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound sample buffer of a DataReader.
//!
//! Writers push into it from any thread; the owning reader drains it
//! atomically and suspends on it with a minimum-count threshold.

use crate::error::{Error, Result};
use crate::qos::{History, QoS, Reliability};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Outcome of a push that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Sample appended.
    Stored,
    /// Sample appended after evicting the oldest one (KeepLast).
    Evicted,
    /// Sample dropped (BestEffort writer, KeepAll history full).
    Dropped,
}

pub(crate) struct InboundBuffer<M> {
    domain_id: u32,
    qos: QoS,
    queue: Mutex<VecDeque<M>>,
    notify: Notify,
    closed: AtomicBool,
    lost: AtomicU64,
}

impl<M> InboundBuffer<M> {
    pub(crate) fn new(domain_id: u32, qos: QoS) -> Self {
        Self {
            domain_id,
            qos,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            lost: AtomicU64::new(0),
        }
    }

    /// Append a sample, applying the reader's history policy.
    ///
    /// `writer_reliability` decides what happens when a KeepAll history is full.
    pub(crate) fn push(&self, sample: M, writer_reliability: Reliability) -> Result<Delivery> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::DomainClosed(self.domain_id));
        }

        let delivery = {
            let mut queue = self.queue.lock();
            match self.qos.history {
                History::KeepLast(depth) => {
                    let evicted = if queue.len() >= depth {
                        queue.pop_front();
                        true
                    } else {
                        false
                    };
                    queue.push_back(sample);
                    if evicted {
                        Delivery::Evicted
                    } else {
                        Delivery::Stored
                    }
                }
                History::KeepAll => {
                    let max_samples = self.qos.resource_limits.max_samples;
                    if queue.len() >= max_samples {
                        match writer_reliability {
                            Reliability::Reliable => {
                                return Err(Error::ResourceLimitExceeded(format!(
                                    "reader history full ({} samples)",
                                    max_samples
                                )));
                            }
                            Reliability::BestEffort => Delivery::Dropped,
                        }
                    } else {
                        queue.push_back(sample);
                        Delivery::Stored
                    }
                }
            }
        };

        match delivery {
            Delivery::Dropped => {
                self.lost.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::Evicted => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                self.notify.notify_waiters();
            }
            Delivery::Stored => self.notify.notify_waiters(),
        }

        Ok(delivery)
    }

    /// Number of buffered samples.
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drain every buffered sample in FIFO order.
    pub(crate) fn drain(&self) -> Vec<M> {
        self.queue.lock().drain(..).collect()
    }

    /// Samples lost to history eviction or best-effort drops.
    pub(crate) fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    /// Wake every waiter and refuse further samples.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Suspend until at least `min_count` samples are buffered.
    ///
    /// Buffered samples always win over cancellation: if the threshold is
    /// already met the call returns `Ok` even with a cancelled token.
    /// Cancellation never removes samples from the buffer.
    pub(crate) async fn wait_for(&self, min_count: usize, token: &CancellationToken) -> Result<()> {
        let min_count = min_count.max(1);

        loop {
            // Register interest before checking the queue so a push between
            // the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.len() >= min_count {
                return Ok(());
            }
            if self.is_closed() {
                return Err(Error::DomainClosed(self.domain_id));
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = token.cancelled() => {
                    // Recheck once: data may have raced the cancellation.
                    if self.len() >= min_count {
                        return Ok(());
                    }
                    return Err(Error::Cancelled);
                }
            }
        }
    }
}
