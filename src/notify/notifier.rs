use crate::notify::types::{LoggingEvent, NotificationError};
use async_trait::async_trait;
use lettre::message::Mailbox;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Who a notification goes to and what it is called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: Vec<Mailbox>,
    pub from: Mailbox,
    pub subject: String,
}

/// One flushed batch of events, ready for delivery
#[derive(Debug, Clone)]
pub struct Notification {
    pub envelope: Envelope,
    /// Oldest first; the triggering event is last
    pub events: Vec<LoggingEvent>,
    pub body: String,
    pub content_type: String,
    pub charset: String,
    pub encoding: String,
}

/// Delivers flushed batches; owns any timeout or retry policy
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;

    /// Release transport resources; pending deliveries should complete first.
    async fn shutdown(&self) {}
}

/// Batches a [`QueuedNotifier`] holds before it starts rejecting new ones.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Hands notifications to a background task so log producers never wait on the network.
///
/// Batches are delivered one at a time in the order they were queued. The
/// queue is bounded: while the inner notifier is stuck, batches beyond the
/// capacity are dropped and reported as [`NotificationError::QueueFull`].
pub struct QueuedNotifier {
    capacity: usize,
    tx: Mutex<Option<mpsc::Sender<Notification>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedNotifier {
    /// Spawn the delivery task on the current tokio runtime.
    pub fn spawn<N: Notifier + 'static>(inner: Arc<N>) -> Self {
        Self::with_capacity(inner, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`QueuedNotifier::spawn`], holding at most `capacity` pending batches.
    pub fn with_capacity<N: Notifier + 'static>(inner: Arc<N>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity);
        let worker = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = inner.send(&notification).await {
                    log::error!(
                        "queued delivery of {} events failed: {}",
                        notification.events.len(),
                        e
                    );
                }
            }
            inner.shutdown().await;
        });
        Self {
            capacity,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl Notifier for QueuedNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let tx = self.tx.lock().await;
        let Some(tx) = tx.as_ref() else {
            return Err(NotificationError::Closed);
        };
        match tx.try_send(notification.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                log::warn!(
                    "delivery queue full; dropping batch of {} events",
                    dropped.events.len()
                );
                Err(NotificationError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotificationError::Closed),
        }
    }

    async fn shutdown(&self) {
        // dropping the sender lets the worker drain the queue and exit
        self.tx.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                log::error!("notification worker terminated abnormally: {}", e);
            }
        }
    }
}
