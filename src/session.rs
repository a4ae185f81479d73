//! Queue sessions with client-side acknowledge modes.
//!
//! SQS itself only knows "delete this receipt handle". A session layers the
//! familiar messaging acknowledge modes on top of that:
//!
//! - [`AcknowledgeMode::AutoAcknowledge`]: every message is deleted as soon as it is received.
//! - [`AcknowledgeMode::ClientAcknowledge`]: acknowledging a message also acknowledges
//!   every message received before it in the same session.
//! - [`AcknowledgeMode::UnorderedAcknowledge`]: acknowledging a message affects only that message.
//!
//! Anything left unacknowledged becomes visible again once the queue's
//! visibility timeout runs out.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::errors::AwsSqsReceiverError;
use crate::message::QueueMessage;
use crate::receiver::config::MAX_WAIT_TIME_SECONDS;
use crate::service::{QueueService, ReceiveRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeMode {
    AutoAcknowledge,
    /// Ordered: acknowledging message N acknowledges everything received before N.
    ClientAcknowledge,
    UnorderedAcknowledge,
}

impl FromStr for AcknowledgeMode {
    type Err = AwsSqsReceiverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" | "auto_acknowledge" => Ok(AcknowledgeMode::AutoAcknowledge),
            "client" | "ordered" | "client_acknowledge" => Ok(AcknowledgeMode::ClientAcknowledge),
            "unordered" | "unordered_acknowledge" => Ok(AcknowledgeMode::UnorderedAcknowledge),
            other => Err(AwsSqsReceiverError::ConfigError(format!(
                "unknown acknowledge mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AcknowledgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcknowledgeMode::AutoAcknowledge => "AUTO_ACKNOWLEDGE",
            AcknowledgeMode::ClientAcknowledge => "CLIENT_ACKNOWLEDGE",
            AcknowledgeMode::UnorderedAcknowledge => "UNORDERED_ACKNOWLEDGE",
        };
        f.write_str(name)
    }
}

/// A delivery still waiting for acknowledgement.
#[derive(Debug, Clone)]
struct PendingDelivery {
    queue_url: String,
    receipt_handle: String,
    message_id: String,
}

#[derive(Debug, Default)]
struct SessionState {
    closed: bool,
    /// Unacknowledged deliveries in the order they were received.
    unacknowledged: Vec<PendingDelivery>,
}

impl SessionState {
    /// Records a delivery. A redelivered message replaces its earlier pending
    /// entry, so each message is pending at most once and always under its
    /// latest receipt handle.
    fn record_delivery(&mut self, delivery: PendingDelivery) {
        self.unacknowledged
            .retain(|d| !(d.queue_url == delivery.queue_url && d.message_id == delivery.message_id));
        self.unacknowledged.push(delivery);
    }

    fn ensure_open(&self) -> Result<(), AwsSqsReceiverError> {
        if self.closed {
            Err(AwsSqsReceiverError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

/// A message received through a session [`Consumer`].
#[derive(Debug, Clone)]
pub struct SessionMessage {
    message: QueueMessage,
    queue_url: String,
}

impl SessionMessage {
    pub fn text(&self) -> &str {
        &self.message.body
    }

    pub fn message(&self) -> &QueueMessage {
        &self.message
    }
}

/// A queue the session made sure exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub queue_url: String,
    /// The timeout the queue actually applies, which for an existing queue may
    /// differ from the one requested at creation.
    pub visibility_timeout: Duration,
}

/// One logical session against the queue service.
///
/// Producers and consumers created from a session share its acknowledge state.
pub struct SqsSession {
    service: Arc<dyn QueueService>,
    mode: AcknowledgeMode,
    state: Arc<Mutex<SessionState>>,
}

impl SqsSession {
    pub fn new(service: Arc<dyn QueueService>, mode: AcknowledgeMode) -> Self {
        SqsSession {
            service,
            mode,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn mode(&self) -> AcknowledgeMode {
        self.mode
    }

    /// Returns the queue URL and its visibility timeout, creating the queue
    /// with `visibility_timeout` when it does not exist.
    ///
    /// `get_queue_url` is tried first since it is cheaper and needs fewer
    /// permissions. Only a "queue does not exist" answer leads to `create_queue`;
    /// any other lookup failure is returned as is.
    pub async fn ensure_queue_exists(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<QueueInfo, AwsSqsReceiverError> {
        self.state.lock().await.ensure_open()?;
        let queue_url = match self.service.get_queue_url(queue_name).await {
            Ok(url) => url,
            Err(e) if e.is_queue_missing() => {
                tracing::info!(queue_name = %queue_name, "creating queue");
                self.service.create_queue(queue_name, visibility_timeout).await?
            }
            Err(e) => return Err(e),
        };
        let visibility_timeout = self.service.get_visibility_timeout(&queue_url).await?;
        Ok(QueueInfo {
            queue_url,
            visibility_timeout,
        })
    }

    pub async fn create_producer(&self, queue_name: &str) -> Result<Producer, AwsSqsReceiverError> {
        self.state.lock().await.ensure_open()?;
        let queue_url = self.service.get_queue_url(queue_name).await?;
        Ok(Producer {
            service: self.service.clone(),
            queue_url,
            state: self.state.clone(),
        })
    }

    /// Creates a consumer whose `receive` waits up to `wait_time` (capped at 20 s).
    pub async fn create_consumer(
        &self,
        queue_name: &str,
        wait_time: Duration,
    ) -> Result<Consumer, AwsSqsReceiverError> {
        self.state.lock().await.ensure_open()?;
        let queue_url = self.service.get_queue_url(queue_name).await?;
        let wait_time_seconds = wait_time
            .as_secs()
            .min(MAX_WAIT_TIME_SECONDS as u64) as i32;
        Ok(Consumer {
            service: self.service.clone(),
            queue_url,
            wait_time_seconds,
            mode: self.mode,
            state: self.state.clone(),
        })
    }

    /// Acknowledges `message` according to the session's mode.
    ///
    /// Acknowledging a message a second time (directly, or implicitly through a
    /// later client acknowledge) does nothing.
    pub async fn acknowledge(&self, message: &SessionMessage) -> Result<(), AwsSqsReceiverError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;

        if self.mode == AcknowledgeMode::AutoAcknowledge {
            return Ok(());
        }

        // Matched by message id: the pending entry carries the latest receipt
        // handle even if `message` came from an earlier delivery.
        let Some(position) = state.unacknowledged.iter().position(|d| {
            d.queue_url == message.queue_url && d.message_id == message.message.message_id
        }) else {
            tracing::debug!(message_id = %message.message.message_id, "message already acknowledged");
            return Ok(());
        };

        let to_delete: Vec<PendingDelivery> = match self.mode {
            AcknowledgeMode::ClientAcknowledge => state.unacknowledged.drain(..=position).collect(),
            _ => vec![state.unacknowledged.remove(position)],
        };

        let mut failures = Vec::new();
        for delivery in &to_delete {
            tracing::debug!(message_id = %delivery.message_id, mode = %self.mode, "acknowledging");
            if let Err(e) = self
                .service
                .delete_message(&delivery.queue_url, &delivery.receipt_handle)
                .await
            {
                failures.push(format!("{}: {}", delivery.message_id, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AwsSqsReceiverError::AcknowledgeError(failures.join("; ")))
        }
    }

    /// Number of received messages not yet acknowledged.
    pub async fn unacknowledged_count(&self) -> usize {
        self.state.lock().await.unacknowledged.len()
    }

    /// Closes the session. Unacknowledged messages are left for the visibility
    /// timeout to return to the queue.
    pub async fn close(&self) -> Result<(), AwsSqsReceiverError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        if !state.unacknowledged.is_empty() {
            tracing::debug!(
                count = state.unacknowledged.len(),
                "closing session with unacknowledged messages"
            );
        }
        state.unacknowledged.clear();
        state.closed = true;
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

/// Sends text messages to one queue.
pub struct Producer {
    service: Arc<dyn QueueService>,
    queue_url: String,
    state: Arc<Mutex<SessionState>>,
}

impl Producer {
    /// Sends `text` and returns the message id the service assigned.
    pub async fn send_text(&self, text: &str) -> Result<String, AwsSqsReceiverError> {
        self.state.lock().await.ensure_open()?;
        self.service.send_message(&self.queue_url, text).await
    }
}

/// Receives messages one at a time from one queue.
pub struct Consumer {
    service: Arc<dyn QueueService>,
    queue_url: String,
    wait_time_seconds: i32,
    mode: AcknowledgeMode,
    state: Arc<Mutex<SessionState>>,
}

impl Consumer {
    /// Receives a single message, or `None` if the queue stayed empty for the
    /// whole wait time.
    pub async fn receive(&self) -> Result<Option<SessionMessage>, AwsSqsReceiverError> {
        self.state.lock().await.ensure_open()?;

        let request = ReceiveRequest {
            max_number_of_messages: 1,
            wait_time_seconds: self.wait_time_seconds,
        };
        let Some(message) = self
            .service
            .receive_messages(&self.queue_url, request)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        if self.mode == AcknowledgeMode::AutoAcknowledge {
            self.service
                .delete_message(&self.queue_url, &message.receipt_handle)
                .await?;
        } else {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            state.record_delivery(PendingDelivery {
                queue_url: self.queue_url.clone(),
                receipt_handle: message.receipt_handle.clone(),
                message_id: message.message_id.clone(),
            });
        }

        Ok(Some(SessionMessage {
            message,
            queue_url: self.queue_url.clone(),
        }))
    }
}
