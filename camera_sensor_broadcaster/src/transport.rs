//! Messaging transport seam and the in-process implementation.
//!
//! A [`Transport`] hands out [`MessagePublisher`] endpoints per topic. The
//! broadcaster only ever calls `publish()` from its delivery worker, never
//! from the RT cycle, but endpoints must still not block indefinitely:
//! [`InProcessTransport`] uses bounded per-subscriber queues and drops
//! messages for subscribers that fall behind.

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Error types for transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Topic name is malformed.
    #[error("Invalid topic name: {0}")]
    InvalidTopic(String),

    /// Transport cannot serve the request right now.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// Endpoint was closed.
    #[error("Endpoint closed: {0}")]
    Closed(String),
}

/// A publish endpoint bound to one topic.
pub trait MessagePublisher<M>: Send {
    /// Topic this endpoint publishes on.
    fn topic(&self) -> &str;

    /// Hand `msg` to the transport.
    fn publish(&self, msg: &M) -> Result<(), TransportError>;
}

/// Factory of publish endpoints.
pub trait Transport<M>: Send + Sync {
    /// Create an endpoint for `topic`.
    ///
    /// # Errors
    /// `TransportError::InvalidTopic` for malformed names; implementation
    /// specific errors otherwise.
    fn create_publisher(&self, topic: &str) -> Result<Box<dyn MessagePublisher<M>>, TransportError>;
}

/// Check a fully-qualified topic name: `/seg[/seg...]`, segments of `[A-Za-z0-9_]`.
pub fn validate_topic(topic: &str) -> Result<(), TransportError> {
    let Some(rest) = topic.strip_prefix('/') else {
        return Err(TransportError::InvalidTopic(format!("'{topic}' must start with '/'")));
    };
    let valid = !rest.is_empty()
        && rest.split('/').all(|seg| {
            !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        return Err(TransportError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

struct Topic<M> {
    subscribers: Mutex<Vec<Sender<M>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl<M> Default for Topic<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

/// In-process pub/sub transport.
pub struct InProcessTransport<M> {
    topics: Mutex<HashMap<String, Arc<Topic<M>>>>,
}

impl<M: Clone + Send + 'static> InProcessTransport<M> {
    /// Create a transport with no topics.
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn topic(&self, name: &str) -> Arc<Topic<M>> {
        let mut topics = self.topics.lock();
        Arc::clone(topics.entry(name.to_string()).or_default())
    }

    /// Subscribe to `topic` with a queue of `depth` messages.
    ///
    /// # Errors
    /// `TransportError::InvalidTopic` for malformed names.
    pub fn subscribe(&self, topic: &str, depth: usize) -> Result<Subscription<M>, TransportError> {
        validate_topic(topic)?;
        let (tx, rx) = bounded(depth.max(1));
        self.topic(topic).subscribers.lock().push(tx);
        Ok(Subscription {
            topic: topic.to_string(),
            rx,
        })
    }

    /// Messages handed to at least one subscriber queue on `topic`.
    pub fn delivered(&self, topic: &str) -> u64 {
        self.topic(topic).delivered.load(Ordering::Relaxed)
    }

    /// Messages dropped on `topic` because a subscriber queue was full.
    pub fn dropped(&self, topic: &str) -> u64 {
        self.topic(topic).dropped.load(Ordering::Relaxed)
    }
}

impl<M: Clone + Send + 'static> Default for InProcessTransport<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Send + 'static> Transport<M> for InProcessTransport<M> {
    fn create_publisher(
        &self,
        topic: &str,
    ) -> Result<Box<dyn MessagePublisher<M>>, TransportError> {
        validate_topic(topic)?;
        Ok(Box::new(InProcessPublisher {
            name: topic.to_string(),
            topic: self.topic(topic),
        }))
    }
}

struct InProcessPublisher<M> {
    name: String,
    topic: Arc<Topic<M>>,
}

impl<M: Clone + Send + 'static> MessagePublisher<M> for InProcessPublisher<M> {
    fn topic(&self) -> &str {
        &self.name
    }

    fn publish(&self, msg: &M) -> Result<(), TransportError> {
        let mut subscribers = self.topic.subscribers.lock();
        let mut delivered = false;
        subscribers.retain(|tx| match tx.try_send(msg.clone()) {
            Ok(()) => {
                delivered = true;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.topic.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        if delivered {
            self.topic.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Receiving end of an in-process subscription.
pub struct Subscription<M> {
    topic: String,
    rx: Receiver<M>,
}

impl<M> Subscription<M> {
    /// Subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<M> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Take the next message if one is queued.
    pub fn try_recv(&self) -> Option<M> {
        self.rx.try_recv().ok()
    }
}
