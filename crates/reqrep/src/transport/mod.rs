// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process publish/subscribe transport.
//!
//! The request/reply layer only needs three things from a transport:
//! `publish(topic, message)`, `subscribe(topic) -> inbound buffer` and
//! `matchedEndpointCount(topic)`. This module provides them inside one
//! process, with an explicit handle instead of a process-wide factory.
//!
//! # Architecture
//!
//! ```text
//! Domain (cloneable handle, explicit dispose)
//! +-- topics: DashMap<String, TopicEntry>
//!
//! TopicEntry
//! +-- type_name: &'static str   (first type registered wins)
//! +-- channel:   Arc<TopicChannel<M>>
//!
//! TopicChannel<M>
//! +-- writers: AtomicUsize
//! +-- readers: RwLock<Vec<ReaderSlot<M>>>   (buffer + optional filter)
//! ```
//!
//! Matching is by topic name and message type: endpoints on the same topic
//! of the same `Domain` see each other as soon as they are created, and
//! stop matching when dropped. A topic entry is released with its last
//! endpoint, after which the name may be bound to another type.

mod buffer;
mod guid;

pub use guid::{Guid, ENTITY_KIND_READER, ENTITY_KIND_WRITER};

use crate::error::{Error, Result};
use crate::qos::QoS;
use buffer::{Delivery, InboundBuffer};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Highest valid domain id.
pub const MAX_DOMAIN_ID: u32 = 232;

/// Anything that can travel on a topic.
pub trait Message: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Message for T {}

/// Content filter evaluated on the writer side before delivery to a reader.
pub type MessageFilter<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;

/// Transport handle for one domain.
///
/// Cheap to clone; all clones share the same topics. Endpoints keep the
/// domain state alive, `dispose()` ends it for everyone.
#[derive(Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

struct DomainInner {
    domain_id: u32,
    guid_prefix: [u8; 12],
    next_entity: AtomicU32,
    topics: DashMap<String, TopicEntry>,
    closed: AtomicBool,
}

struct TopicEntry {
    type_name: &'static str,
    channel: Arc<dyn Any + Send + Sync>,
    close: Arc<dyn Fn() + Send + Sync>,
    endpoint_count: Arc<dyn Fn() -> usize + Send + Sync>,
}

struct TopicChannel<M> {
    name: String,
    writers: AtomicUsize,
    readers: RwLock<Vec<ReaderSlot<M>>>,
}

struct ReaderSlot<M> {
    guid: Guid,
    buffer: Arc<InboundBuffer<M>>,
    filter: Option<MessageFilter<M>>,
}

impl<M: Message> TopicChannel<M> {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            writers: AtomicUsize::new(0),
            readers: RwLock::new(Vec::new()),
        }
    }

    fn reader_count(&self) -> usize {
        self.readers.read().len()
    }

    fn close_readers(&self) {
        for slot in self.readers.read().iter() {
            slot.buffer.close();
        }
    }
}

impl Domain {
    /// Create a transport handle for `domain_id` (0-232).
    pub fn new(domain_id: u32) -> Result<Self> {
        if domain_id > MAX_DOMAIN_ID {
            return Err(Error::InvalidDomainId(domain_id));
        }

        let guid_prefix = guid::generate_prefix(domain_id);
        tracing::debug!("Domain {} created (prefix {:02x?})", domain_id, guid_prefix);

        Ok(Self {
            inner: Arc::new(DomainInner {
                domain_id,
                guid_prefix,
                next_entity: AtomicU32::new(1),
                topics: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Domain id of this handle.
    pub fn domain_id(&self) -> u32 {
        self.inner.domain_id
    }

    /// True once `dispose()` has been called on any clone.
    pub fn is_disposed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// End the domain: wake every blocked reader with `DomainClosed` and
    /// refuse new endpoints and writes.
    pub fn dispose(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("Domain {} disposed", self.inner.domain_id);
        for entry in self.inner.topics.iter() {
            (entry.close)();
        }
    }

    /// Total endpoints (writers + readers) currently on `topic`.
    pub fn matched_endpoint_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .get(topic)
            .map(|entry| (entry.endpoint_count)())
            .unwrap_or(0)
    }

    /// Create a writer on `topic`.
    pub fn create_writer<M: Message>(&self, topic: &str, qos: QoS) -> Result<DataWriter<M>> {
        qos.validate()
            .map_err(|e| Error::Config(crate::config::ConfigError::Invalid(e)))?;
        let channel = self.attach::<M>(topic, |channel| {
            channel.writers.fetch_add(1, Ordering::AcqRel);
        })?;

        let guid = self.next_guid(ENTITY_KIND_WRITER);
        tracing::debug!("DataWriter {} created on '{}'", guid, topic);

        Ok(DataWriter {
            guid,
            qos,
            channel,
            domain: Arc::clone(&self.inner),
        })
    }

    /// Create a reader on `topic` receiving every sample.
    pub fn create_reader<M: Message>(&self, topic: &str, qos: QoS) -> Result<DataReader<M>> {
        self.register_reader(topic, qos, None)
    }

    /// Create a reader on `topic` receiving only samples accepted by `filter`.
    pub fn create_filtered_reader<M, F>(&self, topic: &str, qos: QoS, filter: F) -> Result<DataReader<M>>
    where
        M: Message,
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.register_reader(topic, qos, Some(Arc::new(filter)))
    }

    fn register_reader<M: Message>(
        &self,
        topic: &str,
        qos: QoS,
        filter: Option<MessageFilter<M>>,
    ) -> Result<DataReader<M>> {
        qos.validate()
            .map_err(|e| Error::Config(crate::config::ConfigError::Invalid(e)))?;
        let guid = self.next_guid(ENTITY_KIND_READER);
        let buffer = Arc::new(InboundBuffer::new(self.inner.domain_id, qos));

        let slot = ReaderSlot {
            guid,
            buffer: Arc::clone(&buffer),
            filter,
        };
        let channel = self.attach::<M>(topic, move |channel| {
            channel.readers.write().push(slot);
        })?;
        tracing::debug!("DataReader {} created on '{}'", guid, topic);

        Ok(DataReader {
            guid,
            buffer,
            channel,
            domain: Arc::clone(&self.inner),
        })
    }

    fn next_guid(&self, kind: u8) -> Guid {
        let index = self.inner.next_entity.fetch_add(1, Ordering::Relaxed);
        Guid::for_entity(self.inner.guid_prefix, index, kind)
    }

    /// Look up (or create) the typed channel of `topic` and run `register`
    /// on it while the topic entry is locked, so a concurrent drop of the
    /// last endpoint cannot prune the entry in between.
    fn attach<M: Message>(
        &self,
        topic: &str,
        register: impl FnOnce(&TopicChannel<M>),
    ) -> Result<Arc<TopicChannel<M>>> {
        if self.is_disposed() {
            return Err(Error::DomainClosed(self.inner.domain_id));
        }

        let requested = std::any::type_name::<M>();
        let entry = self.inner.topics.entry(topic.to_string()).or_insert_with(|| {
            let channel = Arc::new(TopicChannel::<M>::new(topic));
            let for_close = Arc::clone(&channel);
            let for_count = Arc::clone(&channel);
            TopicEntry {
                type_name: requested,
                channel,
                close: Arc::new(move || for_close.close_readers()),
                endpoint_count: Arc::new(move || {
                    for_count.writers.load(Ordering::Acquire) + for_count.reader_count()
                }),
            }
        });

        let channel = Arc::clone(&entry.channel)
            .downcast::<TopicChannel<M>>()
            .map_err(|_| Error::TypeMismatch {
                topic: topic.to_string(),
                registered: entry.type_name,
                requested,
            })?;
        register(&channel);
        drop(entry);
        Ok(channel)
    }

    /// Number of topics with at least one live endpoint.
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }
}

impl DomainInner {
    /// Forget `topic` once its last endpoint is gone.
    fn release_topic(&self, topic: &str) {
        let removed = self
            .topics
            .remove_if(topic, |_, entry| (entry.endpoint_count)() == 0);
        if removed.is_some() {
            tracing::trace!("Domain {}: topic '{}' released", self.domain_id, topic);
        }
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("domain_id", &self.inner.domain_id)
            .field("topics", &self.inner.topics.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Publishes samples of type `M` on one topic.
pub struct DataWriter<M: Message> {
    guid: Guid,
    qos: QoS,
    channel: Arc<TopicChannel<M>>,
    domain: Arc<DomainInner>,
}

impl<M: Message> DataWriter<M> {
    /// Deliver `sample` to every matched reader whose filter accepts it.
    ///
    /// Returns the number of readers that stored the sample. A reliable
    /// writer fails with `ResourceLimitExceeded` if a reader's history is full;
    /// readers earlier in the match list have already received the sample.
    pub fn write(&self, sample: &M) -> Result<usize> {
        if self.domain.closed.load(Ordering::Acquire) {
            return Err(Error::DomainClosed(self.domain.domain_id));
        }

        let readers = self.channel.readers.read();
        let mut delivered = 0;
        for slot in readers.iter() {
            if let Some(filter) = &slot.filter {
                if !filter(sample) {
                    continue;
                }
            }
            match slot.buffer.push(sample.clone(), self.qos.reliability)? {
                Delivery::Stored | Delivery::Evicted => delivered += 1,
                Delivery::Dropped => {
                    tracing::debug!(
                        "'{}': sample dropped for reader {} (history full)",
                        self.channel.name,
                        slot.guid
                    );
                }
            }
        }

        tracing::trace!(
            "'{}': writer {} delivered to {} reader(s)",
            self.channel.name,
            self.guid,
            delivered
        );
        Ok(delivered)
    }

    /// Number of readers currently matched on the topic.
    pub fn matched_subscriptions(&self) -> usize {
        self.channel.reader_count()
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn topic_name(&self) -> &str {
        &self.channel.name
    }

    pub fn qos(&self) -> &QoS {
        &self.qos
    }
}

impl<M: Message> Drop for DataWriter<M> {
    fn drop(&mut self) {
        self.channel.writers.fetch_sub(1, Ordering::AcqRel);
        self.domain.release_topic(&self.channel.name);
    }
}

/// Receives samples of type `M` from one topic.
pub struct DataReader<M: Message> {
    guid: Guid,
    buffer: Arc<InboundBuffer<M>>,
    channel: Arc<TopicChannel<M>>,
    domain: Arc<DomainInner>,
}

impl<M: Message> DataReader<M> {
    /// Drain every buffered sample (non-blocking, FIFO).
    pub fn take(&self) -> Vec<M> {
        self.buffer.drain()
    }

    /// Number of samples waiting to be taken.
    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    /// Suspend until at least `min_count` samples are buffered.
    ///
    /// Fails with `Cancelled` if `token` fires first (buffered samples stay
    /// available) or `DomainClosed` if the domain is disposed.
    pub async fn wait_for_samples(&self, min_count: usize, token: &CancellationToken) -> Result<()> {
        self.buffer.wait_for(min_count, token).await
    }

    /// Number of writers currently matched on the topic.
    pub fn matched_publications(&self) -> usize {
        self.channel.writers.load(Ordering::Acquire)
    }

    /// Samples lost to history eviction or best-effort drops.
    pub fn samples_lost(&self) -> u64 {
        self.buffer.lost()
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn topic_name(&self) -> &str {
        &self.channel.name
    }

    pub fn domain_id(&self) -> u32 {
        self.domain.domain_id
    }
}

impl<M: Message> Drop for DataReader<M> {
    fn drop(&mut self) {
        let guid = self.guid;
        self.channel.readers.write().retain(|slot| slot.guid != guid);
        self.buffer.close();
        self.domain.release_topic(&self.channel.name);
    }
}
