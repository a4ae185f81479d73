use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::QueueAttributeName;

use crate::errors::AwsSqsReceiverError;
use crate::message::QueueMessage;
use crate::receiver::config::AwsSqsReceiverConfig;

/// Parameters of a single receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_number_of_messages: i32,
    pub wait_time_seconds: i32,
}

impl From<&AwsSqsReceiverConfig> for ReceiveRequest {
    fn from(config: &AwsSqsReceiverConfig) -> Self {
        ReceiveRequest {
            max_number_of_messages: config.max_number_of_messages,
            wait_time_seconds: config.wait_time_seconds,
        }
    }
}

/// The queue operations this crate needs from the messaging service.
///
/// `aws_sdk_sqs::Client` is the production implementation;
/// [`crate::memory::InMemoryQueueService`] stands in for it in tests.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Resolves a queue name to its URL.
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, AwsSqsReceiverError>;

    /// The visibility timeout the queue currently applies to deliveries.
    async fn get_visibility_timeout(&self, queue_url: &str)
    -> Result<Duration, AwsSqsReceiverError>;

    /// Creates the queue (or returns the existing one) and yields its URL.
    async fn create_queue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<String, AwsSqsReceiverError>;

    /// One long-poll receive. An empty queue yields an empty vector.
    async fn receive_messages(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, AwsSqsReceiverError>;

    /// Sends a text message and returns the service-assigned message id.
    async fn send_message(&self, queue_url: &str, body: &str)
    -> Result<String, AwsSqsReceiverError>;

    /// Deletes one delivery, identified by its receipt handle.
    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), AwsSqsReceiverError>;
}

#[async_trait]
impl QueueService for aws_sdk_sqs::Client {
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, AwsSqsReceiverError> {
        let output = self
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .is_some_and(|se| se.is_queue_does_not_exist());
                if missing {
                    AwsSqsReceiverError::QueueDoesNotExist {
                        queue_name: queue_name.to_string(),
                    }
                } else {
                    AwsSqsReceiverError::QueueResolutionError {
                        queue_name: queue_name.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| AwsSqsReceiverError::QueueResolutionError {
                queue_name: queue_name.to_string(),
                message: "service returned no queue URL".to_string(),
            })
    }

    async fn get_visibility_timeout(
        &self,
        queue_url: &str,
    ) -> Result<Duration, AwsSqsReceiverError> {
        let output = self
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::VisibilityTimeout)
            .send()
            .await
            .map_err(|e| AwsSqsReceiverError::QueueResolutionError {
                queue_name: queue_url.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let seconds = output
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::VisibilityTimeout))
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| AwsSqsReceiverError::QueueResolutionError {
                queue_name: queue_url.to_string(),
                message: "service returned no VisibilityTimeout attribute".to_string(),
            })?;

        Ok(Duration::from_secs(seconds))
    }

    async fn create_queue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<String, AwsSqsReceiverError> {
        let output = self
            .create_queue()
            .queue_name(queue_name)
            .attributes(
                QueueAttributeName::VisibilityTimeout,
                visibility_timeout.as_secs().to_string(),
            )
            .send()
            .await
            .map_err(|e| AwsSqsReceiverError::QueueResolutionError {
                queue_name: queue_name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| AwsSqsReceiverError::QueueResolutionError {
                queue_name: queue_name.to_string(),
                message: "service returned no queue URL".to_string(),
            })
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
        let output = self
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(request.max_number_of_messages)
            .wait_time_seconds(request.wait_time_seconds)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| AwsSqsReceiverError::ReceiveError(DisplayErrorContext(&e).to_string()))?;

        Ok(output.messages().iter().map(QueueMessage::from_sqs).collect())
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
    ) -> Result<String, AwsSqsReceiverError> {
        let output = self
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| AwsSqsReceiverError::SendError(DisplayErrorContext(&e).to_string()))?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), AwsSqsReceiverError> {
        self.delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                AwsSqsReceiverError::AcknowledgeError(DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }
}
