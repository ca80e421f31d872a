//! The outbound channel.
//!
//! ```text
//!  scheduler tasks ──try_publish──► BoundedQueue ──pop_batch──► worker thread ──► Transport
//!                   ◄─BufferFull──┘                                 │
//!                                                        delivery errors: logged + counted
//! ```
//!
//! Publishing never blocks: a full queue returns the message to the caller.
//! Delivery happens on a dedicated thread so slow transports never stall
//! the async runtime.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::bounded_queue::{BoundedQueue, PushResult};
use crate::transport::Transport;

/// A payload bound for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Bytes,
    /// Message timestamp in nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
}

/// Result of [`Channel::try_publish`].
#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Accepted,
    /// The channel's buffer is full; the message is handed back for retry.
    BufferFull(OutboundMessage),
}

/// The producer side of a message bus connection.
pub trait Channel: Send + Sync + Debug {
    /// Hands a message to the channel without blocking.
    fn try_publish(&self, message: OutboundMessage) -> PublishOutcome;

    /// Blocks until every accepted message is delivered or `timeout`
    /// passes. Returns the number still undelivered.
    fn flush(&self, timeout: Duration) -> usize;

    /// Flushes for up to `grace`, then releases the connection whatever is
    /// left. Returns the number of messages dropped. Idempotent.
    fn shutdown(&self, grace: Duration) -> usize;
}

/// Sizing of a [`QueueChannel`].
#[derive(Debug, Clone)]
pub struct QueueChannelConfig {
    pub capacity: usize,
    /// Larger messages are dropped with an error log.
    pub max_message_bytes: usize,
    /// Messages delivered between transport flushes.
    pub batch_size: usize,
}

impl Default for QueueChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            max_message_bytes: 1_000_000_000,
            batch_size: 256,
        }
    }
}

/// Delivery counters of a [`QueueChannel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub delivered: u64,
    pub failed: u64,
    /// Accepted but not yet delivered or failed.
    pub pending: usize,
}

#[derive(Debug)]
struct Shared {
    queue: BoundedQueue<OutboundMessage>,
    /// Accepted messages not yet delivered or failed, including those the
    /// worker has popped but not finished.
    pending: AtomicUsize,
    delivered: AtomicU64,
    failed: AtomicU64,
    stopping: AtomicBool,
    max_message_bytes: usize,
    batch_size: usize,
}

/// The bundled channel: a bounded queue drained by one worker thread.
#[derive(Debug)]
pub struct QueueChannel {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: thread::Thread,
}

impl QueueChannel {
    /// Starts the delivery worker.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` is 0.
    pub fn spawn(
        config: QueueChannelConfig,
        transport: Box<dyn Transport>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: BoundedQueue::new(config.capacity),
            pending: AtomicUsize::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
            max_message_bytes: config.max_message_bytes,
            batch_size: config.batch_size.max(1),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("nxs-delivery".into())
            .spawn(move || deliver_loop(&worker_shared, transport))?;
        let worker_thread = worker.thread().clone();
        debug!(capacity = config.capacity, "started delivery worker");
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            worker_thread,
        })
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            delivered: self.shared.delivered.load(Ordering::Acquire),
            failed: self.shared.failed.load(Ordering::Acquire),
            pending: self.shared.pending.load(Ordering::Acquire),
        }
    }
}

impl Channel for QueueChannel {
    fn try_publish(&self, message: OutboundMessage) -> PublishOutcome {
        if self.shared.stopping.load(Ordering::Acquire) {
            // Nothing will drain the queue again.
            return PublishOutcome::BufferFull(message);
        }
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        match self.shared.queue.try_push(message) {
            PushResult::Ok => {
                self.worker_thread.unpark();
                PublishOutcome::Accepted
            }
            PushResult::Full(message) => {
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                PublishOutcome::BufferFull(message)
            }
        }
    }

    fn flush(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let pending = self.shared.pending.load(Ordering::Acquire);
            if pending == 0 || Instant::now() >= deadline {
                return pending;
            }
            self.worker_thread.unpark();
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn shutdown(&self, grace: Duration) -> usize {
        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return self.shared.pending.load(Ordering::Acquire);
        };

        let remaining = self.flush(grace);
        if remaining > 0 {
            warn!(remaining, "flush timed out, dropping undelivered messages");
        }
        self.shared.stopping.store(true, Ordering::Release);
        self.worker_thread.unpark();
        if worker.join().is_err() {
            error!("delivery worker panicked");
        }
        let stats = self.stats();
        debug!(
            delivered = stats.delivered,
            failed = stats.failed,
            dropped = stats.pending,
            "delivery worker stopped"
        );
        stats.pending
    }
}

impl Drop for QueueChannel {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::Release);
        self.worker_thread.unpark();
    }
}

fn deliver_loop(shared: &Shared, mut transport: Box<dyn Transport>) {
    while !shared.stopping.load(Ordering::Acquire) {
        let batch = shared.queue.pop_batch(shared.batch_size);
        if batch.is_empty() {
            thread::park_timeout(Duration::from_millis(50));
            continue;
        }
        for message in &batch {
            deliver_one(shared, transport.as_mut(), message);
        }
        if let Err(e) = transport.flush() {
            error!(error = %e, "failed to flush transport");
        }
    }
    if let Err(e) = transport.flush() {
        error!(error = %e, "failed to flush transport");
    }
}

fn deliver_one(shared: &Shared, transport: &mut dyn Transport, message: &OutboundMessage) {
    let result = if message.payload.len() > shared.max_message_bytes {
        Err(crate::TransportError::MessageTooLarge {
            size: message.payload.len(),
            max: shared.max_message_bytes,
        })
    } else {
        transport.deliver(message)
    };
    match result {
        Ok(()) => {
            shared.delivered.fetch_add(1, Ordering::AcqRel);
        }
        Err(e) => {
            error!(topic = %message.topic, error = %e, "message failed delivery");
            shared.failed.fetch_add(1, Ordering::AcqRel);
        }
    }
    shared.pending.fetch_sub(1, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn message(n: u8) -> OutboundMessage {
        OutboundMessage {
            topic: "LOKI_events".into(),
            payload: Bytes::from(vec![n; 8]),
            timestamp_ns: i64::from(n),
        }
    }

    #[test]
    fn delivers_in_publish_order() {
        let transport = MemoryTransport::new();
        let channel =
            QueueChannel::spawn(QueueChannelConfig::default(), Box::new(transport.clone()))
                .unwrap();
        for n in 0..50 {
            assert_eq!(channel.try_publish(message(n)), PublishOutcome::Accepted);
        }
        assert_eq!(channel.flush(Duration::from_secs(5)), 0);

        let stamps: Vec<i64> = transport.delivered().iter().map(|m| m.timestamp_ns).collect();
        assert_eq!(stamps, (0..50).collect::<Vec<_>>());
        assert_eq!(channel.stats().delivered, 50);
        assert_eq!(channel.shutdown(Duration::from_secs(1)), 0);
    }

    #[test]
    fn oversized_message_fails_without_blocking_others() {
        let transport = MemoryTransport::new();
        let config = QueueChannelConfig {
            max_message_bytes: 4,
            ..QueueChannelConfig::default()
        };
        let channel = QueueChannel::spawn(config, Box::new(transport.clone())).unwrap();
        let mut small = message(1);
        small.payload = Bytes::from_static(b"ok");
        assert_eq!(channel.try_publish(message(0)), PublishOutcome::Accepted);
        assert_eq!(channel.try_publish(small), PublishOutcome::Accepted);
        assert_eq!(channel.flush(Duration::from_secs(5)), 0);

        let stats = channel.stats();
        assert_eq!((stats.delivered, stats.failed), (1, 1));
        assert_eq!(transport.delivered().len(), 1);
    }

    #[test]
    fn publish_after_shutdown_is_refused() {
        let channel =
            QueueChannel::spawn(QueueChannelConfig::default(), Box::new(MemoryTransport::new()))
                .unwrap();
        assert_eq!(channel.shutdown(Duration::from_millis(100)), 0);
        assert_eq!(channel.shutdown(Duration::from_millis(100)), 0);
        assert!(matches!(
            channel.try_publish(message(3)),
            PublishOutcome::BufferFull(_)
        ));
    }

    #[derive(Debug)]
    struct StalledTransport;

    impl Transport for StalledTransport {
        fn deliver(&mut self, _: &OutboundMessage) -> Result<(), crate::TransportError> {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        }
    }

    #[test]
    fn full_queue_hands_message_back() {
        let config = QueueChannelConfig {
            capacity: 2,
            batch_size: 1,
            ..QueueChannelConfig::default()
        };
        let channel = QueueChannel::spawn(config, Box::new(StalledTransport)).unwrap();
        let outcomes: Vec<bool> = (0..10)
            .map(|n| matches!(channel.try_publish(message(n)), PublishOutcome::Accepted))
            .collect();
        // at most two queued plus one in the worker's hands
        assert!(outcomes.iter().filter(|accepted| **accepted).count() <= 3);
        assert!(outcomes.contains(&false));
        assert!(channel.shutdown(Duration::from_millis(10)) > 0);
    }
}
