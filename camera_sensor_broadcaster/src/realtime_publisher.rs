//! Non-blocking publish channel for the RT cycle.
//!
//! A [`RealtimePublisher`] owns exactly one outgoing message and a delivery
//! worker thread. The RT side calls [`RealtimePublisher::try_lock`]: it
//! either gets exclusive access to the message immediately or gets `None`
//! and skips the cycle. Skipped updates are never queued or retried.
//!
//! ## Handoff Protocol
//!
//! `turn` decides who may touch the message next:
//! - `REALTIME` - the cycle may lock, mutate and hand off
//! - `NON_REALTIME` - a delivery is in flight; `try_lock` fails
//!
//! `unlock_and_publish()` flips `turn` to `NON_REALTIME`, releases the lock
//! and unparks the worker, which otherwise stays parked. The worker clones
//! the message, publishes the clone and flips `turn` back. At most one
//! mutate-and-send pair is in flight at any time.

use crate::transport::MessagePublisher;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, Thread};
use tracing::{debug, warn};

const REALTIME: u8 = 0;
const NON_REALTIME: u8 = 1;

/// Delivery counters, readable from any thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishStats {
    /// Messages accepted by the transport.
    pub published: u64,
    /// `try_lock` calls that returned `None`.
    pub skipped: u64,
    /// Messages the transport rejected.
    pub failed: u64,
}

struct Shared<M> {
    msg: Mutex<M>,
    turn: AtomicU8,
    keep_running: AtomicBool,
    published: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Single-slot, try-acquire publisher.
pub struct RealtimePublisher<M: Clone + Send + 'static> {
    shared: Arc<Shared<M>>,
    worker: Option<JoinHandle<()>>,
    topic: String,
}

impl<M: Clone + Send + 'static> RealtimePublisher<M> {
    /// Wrap `publisher` and start the delivery worker.
    ///
    /// # Errors
    /// Returns the OS error if the worker thread cannot be spawned.
    pub fn new(publisher: Box<dyn MessagePublisher<M>>, initial: M) -> std::io::Result<Self> {
        let topic = publisher.topic().to_string();
        let shared = Arc::new(Shared {
            msg: Mutex::new(initial),
            turn: AtomicU8::new(REALTIME),
            keep_running: AtomicBool::new(true),
            published: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("rt_publisher".to_string())
            .spawn(move || delivery_loop(worker_shared, publisher))?;

        debug!("Realtime publisher started on {}", topic);
        Ok(Self {
            shared,
            worker: Some(worker),
            topic,
        })
    }

    /// Topic of the wrapped endpoint.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Blocking access to the message, for non-RT setup only.
    pub fn lock(&self) -> MutexGuard<'_, M> {
        self.shared.msg.lock()
    }

    /// Try to take the message without blocking.
    ///
    /// Returns `None` if the message is locked or a delivery is in flight.
    /// Never blocks, never allocates.
    #[inline]
    pub fn try_lock(&self) -> Option<PublishGuard<'_, M>> {
        let worker = self.worker.as_ref()?.thread();
        if let Some(guard) = self.shared.msg.try_lock() {
            if self.shared.turn.load(Ordering::Acquire) == REALTIME {
                return Some(PublishGuard {
                    guard,
                    shared: &self.shared,
                    worker,
                });
            }
        }
        self.shared.skipped.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// True while a handed-off message has not been delivered yet.
    pub fn is_delivery_pending(&self) -> bool {
        self.shared.turn.load(Ordering::Acquire) == NON_REALTIME
    }

    /// Snapshot of delivery counters.
    pub fn stats(&self) -> PublishStats {
        PublishStats {
            published: self.shared.published.load(Ordering::Relaxed),
            skipped: self.shared.skipped.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

impl<M: Clone + Send + 'static> Drop for RealtimePublisher<M> {
    fn drop(&mut self) {
        self.shared.keep_running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            // Blocks until an in-flight publish() returns.
            if worker.join().is_err() {
                warn!("Delivery worker for {} panicked", self.topic);
            }
        }
        debug!("Realtime publisher on {} stopped", self.topic);
    }
}

/// Exclusive access to the outgoing message, obtained via `try_lock`.
///
/// Dropping the guard releases the message without publishing.
pub struct PublishGuard<'a, M> {
    guard: MutexGuard<'a, M>,
    shared: &'a Shared<M>,
    worker: &'a Thread,
}

impl<M> PublishGuard<'_, M> {
    /// Release the message and hand it to the delivery worker.
    ///
    /// Returns immediately; delivery happens asynchronously.
    #[inline]
    pub fn unlock_and_publish(self) {
        let worker = self.worker;
        self.shared.turn.store(NON_REALTIME, Ordering::Release);
        drop(self);
        worker.unpark();
    }
}

impl<M> Deref for PublishGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.guard
    }
}

impl<M> DerefMut for PublishGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.guard
    }
}

fn delivery_loop<M: Clone>(shared: Arc<Shared<M>>, publisher: Box<dyn MessagePublisher<M>>) {
    while shared.keep_running.load(Ordering::Acquire) {
        if shared.turn.load(Ordering::Acquire) != NON_REALTIME {
            thread::park();
            continue;
        }

        let outgoing = shared.msg.lock().clone();
        match publisher.publish(&outgoing) {
            Ok(()) => {
                shared.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let failures = shared.failed.fetch_add(1, Ordering::Relaxed) + 1;
                if failures <= 10 || failures % 1000 == 0 {
                    warn!(
                        "Delivery failure #{} on {}: {}",
                        failures,
                        publisher.topic(),
                        e
                    );
                }
            }
        }
        shared.turn.store(REALTIME, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use crossbeam::channel::{self, Receiver, Sender};
    use std::time::{Duration, Instant};

    struct ChannelPublisher {
        tx: Sender<u32>,
    }

    impl MessagePublisher<u32> for ChannelPublisher {
        fn topic(&self) -> &str {
            "/test/raw"
        }

        fn publish(&self, msg: &u32) -> Result<(), TransportError> {
            self.tx
                .send(*msg)
                .map_err(|e| TransportError::Closed(e.to_string()))
        }
    }

    struct RejectingPublisher;

    impl MessagePublisher<u32> for RejectingPublisher {
        fn topic(&self) -> &str {
            "/test/raw"
        }

        fn publish(&self, _msg: &u32) -> Result<(), TransportError> {
            Err(TransportError::Unavailable("rejecting".into()))
        }
    }

    fn channel_publisher() -> (RealtimePublisher<u32>, Receiver<u32>) {
        let (tx, rx) = channel::unbounded();
        let publisher =
            RealtimePublisher::<u32>::new(Box::new(ChannelPublisher { tx }), 0).unwrap();
        (publisher, rx)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_micros(200));
        }
        false
    }

    #[test]
    fn try_lock_mutate_and_publish() {
        let (publisher, rx) = channel_publisher();
        assert_eq!(publisher.topic(), "/test/raw");

        let mut msg = publisher.try_lock().expect("slot free");
        *msg = 42;
        msg.unlock_and_publish();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 42);
        assert!(wait_until(|| !publisher.is_delivery_pending()));
        assert_eq!(publisher.stats().published, 1);
    }

    #[test]
    fn idle_worker_wakes_on_publish_and_on_drop() {
        let (publisher, rx) = channel_publisher();
        thread::sleep(Duration::from_millis(50));

        let mut msg = publisher.try_lock().unwrap();
        *msg = 7;
        msg.unlock_and_publish();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 7);
        assert!(wait_until(|| !publisher.is_delivery_pending()));

        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        drop(publisher);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn dropping_guard_does_not_publish() {
        let (publisher, rx) = channel_publisher();
        {
            let mut msg = publisher.try_lock().unwrap();
            *msg = 5;
        }
        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
        assert!(!publisher.is_delivery_pending());
        assert_eq!(*publisher.lock(), 5);
    }

    #[test]
    fn try_lock_fails_while_locked() {
        let (publisher, _rx) = channel_publisher();
        let held = publisher.lock();
        assert!(publisher.try_lock().is_none());
        drop(held);
        assert!(publisher.try_lock().is_some());
        assert_eq!(publisher.stats().skipped, 1);
    }

    #[test]
    fn delivery_failures_are_counted_not_propagated() {
        let publisher = RealtimePublisher::<u32>::new(Box::new(RejectingPublisher), 0).unwrap();
        publisher.try_lock().unwrap().unlock_and_publish();

        assert!(wait_until(|| publisher.stats().failed == 1));
        assert!(wait_until(|| publisher.try_lock().is_some()));
        assert_eq!(publisher.stats().published, 0);
    }
}
