//! In-memory queue service.
//!
//! Behaves like a standard SQS queue for the operations this crate uses:
//! deliveries hide a message for the queue's visibility timeout and every
//! delivery gets a fresh receipt handle. Only the latest receipt handle
//! deletes a message; an older handle of the same message is accepted and
//! does nothing, as SQS does. Time comes from `tokio::time`, so tests can pause
//! and advance the clock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::{AwsSqsReceiverError, GenericError};
use crate::message::QueueMessage;
use crate::service::{QueueService, ReceiveRequest};

const URL_SCHEME: &str = "memory://";
const POLL_STEP: Duration = Duration::from_millis(50);

struct StoredMessage {
    message_id: String,
    body: String,
    attributes: HashMap<String, String>,
    visible_at: Instant,
    receipt_handle: Option<String>,
    receive_count: u32,
}

struct InMemoryQueue {
    visibility_timeout: Duration,
    messages: VecDeque<StoredMessage>,
    /// Handles that were issued but are no longer current.
    retired_handles: HashSet<String>,
}

impl InMemoryQueue {
    fn take_visible(&mut self, max: usize, now: Instant) -> Vec<QueueMessage> {
        let visibility_timeout = self.visibility_timeout;
        let retired = &mut self.retired_handles;
        self.messages
            .iter_mut()
            .filter(|m| m.visible_at <= now)
            .take(max)
            .map(|m| {
                let receipt_handle = Uuid::new_v4().to_string();
                m.visible_at = now + visibility_timeout;
                if let Some(previous) = m.receipt_handle.replace(receipt_handle.clone()) {
                    retired.insert(previous);
                }
                m.receive_count += 1;
                QueueMessage {
                    message_id: m.message_id.clone(),
                    body: m.body.clone(),
                    receipt_handle,
                    attributes: m.attributes.clone(),
                }
            })
            .collect()
    }
}

/// Thread-safe in-memory stand-in for SQS.
#[derive(Default)]
pub struct InMemoryQueueService {
    queues: Mutex<HashMap<String, InMemoryQueue>>,
}

impl InMemoryQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_url(queue_name: &str) -> String {
        format!("{}{}", URL_SCHEME, queue_name)
    }

    /// Sends a message carrying string attributes, bypassing the trait.
    pub fn send_with_attributes(
        &self,
        queue_url: &str,
        body: &str,
        attributes: &[(&str, &str)],
    ) -> Result<String, AwsSqsReceiverError> {
        let mut queues = self.lock()?;
        let queue = lookup(&mut queues, queue_url)?;
        let message_id = Uuid::new_v4().to_string();
        queue.messages.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: body.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            visible_at: Instant::now(),
            receipt_handle: None,
            receive_count: 0,
        });
        Ok(message_id)
    }

    /// Messages still stored in the queue, visible or in flight.
    pub fn message_count(&self, queue_name: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|queues| queues.get(queue_name).map(|q| q.messages.len()))
            .unwrap_or(0)
    }

    /// How many times the message with `body` has been delivered.
    pub fn receive_count(&self, queue_name: &str, body: &str) -> Option<u32> {
        let queues = self.lock().ok()?;
        queues
            .get(queue_name)?
            .messages
            .iter()
            .find(|m| m.body == body)
            .map(|m| m.receive_count)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, InMemoryQueue>>, AwsSqsReceiverError> {
        self.queues
            .lock()
            .map_err(|e| GenericError::new(format!("in-memory queue lock poisoned: {}", e)).into())
    }
}

fn queue_name_from_url(queue_url: &str) -> Option<&str> {
    queue_url.strip_prefix(URL_SCHEME)
}

fn lookup<'a>(
    queues: &'a mut HashMap<String, InMemoryQueue>,
    queue_url: &str,
) -> Result<&'a mut InMemoryQueue, AwsSqsReceiverError> {
    queue_name_from_url(queue_url)
        .and_then(|name| queues.get_mut(name))
        .ok_or_else(|| GenericError::new(format!("queue does not exist: {}", queue_url)).into())
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, AwsSqsReceiverError> {
        let queues = self.lock()?;
        if queues.contains_key(queue_name) {
            Ok(Self::queue_url(queue_name))
        } else {
            Err(AwsSqsReceiverError::QueueDoesNotExist {
                queue_name: queue_name.to_string(),
            })
        }
    }

    async fn get_visibility_timeout(
        &self,
        queue_url: &str,
    ) -> Result<Duration, AwsSqsReceiverError> {
        let mut queues = self.lock()?;
        Ok(lookup(&mut queues, queue_url)?.visibility_timeout)
    }

    async fn create_queue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<String, AwsSqsReceiverError> {
        let mut queues = self.lock()?;
        queues
            .entry(queue_name.to_string())
            .or_insert_with(|| InMemoryQueue {
                visibility_timeout,
                messages: VecDeque::new(),
                retired_handles: HashSet::new(),
            });
        Ok(Self::queue_url(queue_name))
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
        let max = request.max_number_of_messages.max(1) as usize;
        let deadline =
            Instant::now() + Duration::from_secs(request.wait_time_seconds.max(0) as u64);

        loop {
            let now = Instant::now();
            let batch = {
                let mut queues = self.lock()?;
                lookup(&mut queues, queue_url)
                    .map_err(|e| AwsSqsReceiverError::ReceiveError(e.to_string()))?
                    .take_visible(max, now)
            };
            if !batch.is_empty() || now >= deadline {
                return Ok(batch);
            }
            tokio::time::sleep(POLL_STEP.min(deadline - now)).await;
        }
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
    ) -> Result<String, AwsSqsReceiverError> {
        self.send_with_attributes(queue_url, body, &[])
            .map_err(|e| AwsSqsReceiverError::SendError(e.to_string()))
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), AwsSqsReceiverError> {
        let mut queues = self.lock()?;
        let queue = lookup(&mut queues, queue_url)
            .map_err(|e| AwsSqsReceiverError::AcknowledgeError(e.to_string()))?;
        let position = queue
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle));

        match position {
            Some(position) => {
                queue.messages.remove(position);
                queue.retired_handles.insert(receipt_handle.to_string());
                Ok(())
            }
            None if queue.retired_handles.contains(receipt_handle) => {
                tracing::debug!(receipt_handle = %receipt_handle, "stale receipt handle, nothing deleted");
                Ok(())
            }
            None => Err(AwsSqsReceiverError::AcknowledgeError(format!(
                "receipt handle is invalid: {}",
                receipt_handle
            ))),
        }
    }
}
