use async_trait::async_trait;

use crate::connection::SqsConnection;
use crate::errors::AwsSqsReceiverError;
use crate::message::QueueMessage;
use crate::service::ReceiveRequest;

pub mod config;
mod functions;

pub use config::AwsSqsReceiverConfig;
pub use functions::{PollingRunner, PollingStats, print_message};

/// Anything the polling loop can pull a batch of messages from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// One receive attempt. `Ok(vec![])` means the queue had nothing to deliver.
    async fn receive(&self) -> Result<Vec<QueueMessage>, AwsSqsReceiverError>;
}

/// Issues single long-poll receive calls against a resolved queue.
pub struct SqsMessageReceiver {
    /// The connection holding the queue service and the resolved endpoint.
    connection: SqsConnection,

    /// Long-poll wait and batch size.
    config: AwsSqsReceiverConfig,
}

impl SqsMessageReceiver {
    pub fn new(connection: SqsConnection, config: AwsSqsReceiverConfig) -> Self {
        SqsMessageReceiver { connection, config }
    }

    pub fn config(&self) -> &AwsSqsReceiverConfig {
        &self.config
    }

    /// Receives up to `max_number_of_messages`, waiting at most
    /// `wait_time_seconds` for the first one to arrive.
    ///
    /// Messages come back in the order the service returned them.
    pub async fn receive_messages(&self) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
        let queue_url = self
            .connection
            .queue_url()
            .ok_or(AwsSqsReceiverError::QueueNotResolved)?;

        tracing::debug!(
            queue_url = %queue_url,
            wait_time_seconds = self.config.wait_time_seconds,
            max_number_of_messages = self.config.max_number_of_messages,
            "receive messages"
        );

        self.connection
            .service()
            .receive_messages(queue_url, ReceiveRequest::from(&self.config))
            .await
    }
}

#[async_trait]
impl MessageSource for SqsMessageReceiver {
    async fn receive(&self) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
        self.receive_messages().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQueueService;
    use crate::service::QueueService;
    use crate::settings::Settings;
    use std::sync::Arc;
    use std::time::Duration;

    async fn receiver_for(service: Arc<InMemoryQueueService>, queue: &str) -> SqsMessageReceiver {
        let connection = SqsConnection::connect(service, &Settings::for_queue(queue)).await;
        SqsMessageReceiver::new(connection, AwsSqsReceiverConfig::new(10, 0))
    }

    #[tokio::test]
    async fn empty_queue_returns_empty_vec() {
        let service = Arc::new(InMemoryQueueService::new());
        service.create_queue("empty", Duration::from_secs(30)).await.unwrap();

        let receiver = receiver_for(service, "empty").await;
        let messages = receiver.receive().await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn unresolved_endpoint_is_explicit_error() {
        let service = Arc::new(InMemoryQueueService::new());
        let receiver = receiver_for(service, "nowhere").await;

        let err = receiver.receive().await.unwrap_err();
        assert!(matches!(err, AwsSqsReceiverError::QueueNotResolved));
    }

    #[tokio::test]
    async fn returns_messages_in_service_order_with_attributes() {
        let service = Arc::new(InMemoryQueueService::new());
        let url = service.create_queue("staff", Duration::from_secs(30)).await.unwrap();
        service
            .send_with_attributes(&url, "first", &[("empId", "E1")])
            .unwrap();
        service.send_message(&url, "second").await.unwrap();

        let receiver = receiver_for(service, "staff").await;
        let messages = receiver.receive().await.unwrap();

        let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
        assert_eq!(messages[0].emp_id(), Some("E1"));
        assert_eq!(messages[1].emp_id(), None);
    }
}
