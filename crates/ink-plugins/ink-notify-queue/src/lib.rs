//! # ink-notify-queue
//!
//! In-process implementation of `Notifier`: a bounded channel in front of a
//! worker task that hands each notification to a [`Delivery`] transport.
//!
//! Enqueueing waits for room when the queue is full; the caller bounds that
//! wait with its own timeout. Delivery errors are logged by the worker and
//! never reach the submitter.

use std::sync::Arc;

use async_trait::async_trait;
use ink_core::error::{AppError, Result};
use ink_core::models::Notification;
use ink_core::traits::Notifier;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_CAPACITY: usize = 64;

pub struct QueueNotifier {
    sender: mpsc::Sender<Notification>,
}

impl QueueNotifier {
    /// Creates the notifier and the receiving end for a [`NotificationWorker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for QueueNotifier {
    async fn enqueue(&self, notification: Notification) -> Result<()> {
        self.sender
            .send(notification)
            .await
            .map_err(|_| AppError::NotifyDispatch("notification queue is closed".into()))
    }
}

/// The transport that actually reaches the site owner (mail, chat, ...).
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of sending them.
pub struct LogDelivery {
    recipient: String,
}

impl LogDelivery {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            to = %self.recipient,
            subject = %notification.subject,
            body = %notification.body,
            "notification delivered"
        );
        Ok(())
    }
}

pub struct NotificationWorker {
    receiver: mpsc::Receiver<Notification>,
    delivery: Arc<dyn Delivery>,
}

impl NotificationWorker {
    pub fn new(receiver: mpsc::Receiver<Notification>, delivery: Arc<dyn Delivery>) -> Self {
        Self { receiver, delivery }
    }

    /// Drains the queue until every sender is dropped.
    /// Returns the number of successful deliveries.
    pub async fn run(mut self) -> usize {
        let mut delivered = 0;
        while let Some(notification) = self.receiver.recv().await {
            match self.delivery.deliver(&notification).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::error!(
                        subject = %notification.subject,
                        error = %err,
                        "error while sending notification"
                    );
                }
            }
        }
        tracing::info!(delivered, "notification worker stopped");
        delivered
    }

    pub fn spawn(self) -> JoinHandle<usize> {
        tokio::spawn(self.run())
    }
}
