//! Backpressure absorption in front of the channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, trace};

use crate::SinkError;
use crate::channel::{Channel, OutboundMessage, PublishOutcome};

/// Retry and shutdown timing of a [`BackpressuredSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Wait between attempts while the channel's buffer is full.
    pub backoff: Duration,
    /// How long `close` waits for queued messages to be delivered.
    pub close_grace: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(500),
            close_grace: Duration::from_secs(2),
        }
    }
}

/// Shared publishing front end used by every scheduler of a run.
///
/// A full channel buffer is never an error here: `publish` waits and
/// retries until the message is accepted or the sink is closed.
#[derive(Debug)]
pub struct BackpressuredSink {
    channel: Arc<dyn Channel>,
    config: SinkConfig,
    closed: AtomicBool,
    published: AtomicU64,
    retries: AtomicU64,
}

impl BackpressuredSink {
    pub fn new(channel: Arc<dyn Channel>, config: SinkConfig) -> Self {
        Self {
            channel,
            config,
            closed: AtomicBool::new(false),
            published: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Publishes one payload, waiting out a full buffer.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        timestamp_ns: i64,
    ) -> Result<(), SinkError> {
        let mut message = OutboundMessage {
            topic: topic.to_string(),
            payload,
            timestamp_ns,
        };
        loop {
            if self.is_closed() {
                return Err(SinkError::Closed);
            }
            match self.channel.try_publish(message) {
                PublishOutcome::Accepted => {
                    self.published.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                PublishOutcome::BufferFull(returned) => {
                    let retries = self.retries.fetch_add(1, Ordering::Relaxed) + 1;
                    trace!(topic, retries, "channel buffer full, backing off");
                    message = returned;
                    tokio::time::sleep(self.config.backoff).await;
                }
            }
        }
    }

    /// Stops accepting messages, flushes for the grace period and releases
    /// the channel. Returns the number of messages left undelivered.
    ///
    /// Only the first call does anything.
    pub async fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let channel = Arc::clone(&self.channel);
        let grace = self.config.close_grace;
        let remaining = match tokio::task::spawn_blocking(move || channel.shutdown(grace)).await {
            Ok(remaining) => remaining,
            Err(e) => {
                error!(error = %e, "channel shutdown did not complete");
                0
            }
        };
        if remaining > 0 {
            info!(remaining, "closed sink with undelivered messages");
        } else {
            debug!(
                published = self.published(),
                retries = self.retries(),
                "closed sink"
            );
        }
        remaining
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Messages accepted by the channel.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Times a publish found the buffer full.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}
