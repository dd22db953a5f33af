//! Ordered, best-effort delivery of rendered notifications.
//!
//! Notifications are queued into the [Outbox] as a whole and consumed by a
//! single writer, so the lines of two notifications never interleave.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::Instant,
};

use crate::{irc::codec::IrcCodecError, metrics::Metrics};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed")]
    Disconnected,
    #[error(transparent)]
    Codec(#[from] IrcCodecError),
}

/// Something lines can be written to, usually the irc connection.
#[async_trait]
pub trait DeliverySink: Send {
    async fn send(&mut self, target: &str, line: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// the lines rendered for one webhook notification
pub struct RenderedNotification {
    /// channel or nickname the lines go to
    pub target: String,
    pub lines: Vec<String>,
    /// point in time the webhook receiver accepted the notification
    pub arrival: Instant,
}

impl RenderedNotification {
    pub fn new(target: String, lines: Vec<String>, arrival: Instant) -> Self {
        Self {
            target,
            lines,
            arrival,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
}

/// Sending half of the queue in front of the irc connection.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<RenderedNotification>,
}

impl Outbox {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RenderedNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues `notification` without waiting. A full queue drops it.
    pub fn submit(&self, notification: RenderedNotification) -> Result<(), SubmitError> {
        self.tx.try_send(notification).map_err(|err| match err {
            TrySendError::Full(_) => SubmitError::Full,
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

/// Sends the lines of `notification` in order, each send bounded by `timeout`.
///
/// Nothing is retried: after the first failure the remaining lines are dropped
/// and the error is returned, so the caller can decide whether the connection
/// is still usable.
pub async fn deliver<S>(
    sink: &mut S,
    notification: &RenderedNotification,
    timeout: Duration,
    metrics: &Metrics,
) -> Result<(), DeliveryError>
where
    S: DeliverySink + ?Sized,
{
    for (i, line) in notification.lines.iter().enumerate() {
        let res = match tokio::time::timeout(timeout, sink.send(&notification.target, line)).await
        {
            Ok(res) => res,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        };

        if let Err(err) = res {
            metrics.record_line(false);
            tracing::warn!(
                target_channel = %notification.target,
                dropped = notification.lines.len() - i,
                "failed to deliver notification: {err}"
            );
            return Err(err);
        }

        metrics.record_line(true);
    }

    metrics.observe_delivery(notification.arrival);

    Ok(())
}
