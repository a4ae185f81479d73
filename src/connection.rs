use std::sync::Arc;
use std::time::Duration;

use crate::errors::AwsSqsReceiverError;
use crate::service::QueueService;
use crate::settings::Settings;

/// A resolved queue: where it lives and how to address it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEndpoint {
    pub region: String,
    pub queue_name: String,
    pub queue_url: String,
}

/// Queue service handle plus the endpoint it was resolved to at startup.
///
/// The endpoint is resolved exactly once. If that fails the connection stays
/// usable but empty, and every receive through it fails with
/// [`AwsSqsReceiverError::QueueNotResolved`].
#[derive(Clone)]
pub struct SqsConnection {
    service: Arc<dyn QueueService>,
    endpoint: Option<Arc<QueueEndpoint>>,
}

impl SqsConnection {
    /// Resolves the configured queue, logging (not returning) any failure.
    pub async fn connect(service: Arc<dyn QueueService>, settings: &Settings) -> Self {
        match resolve_endpoint(service.as_ref(), settings).await {
            Ok(endpoint) => {
                tracing::info!(queue_url = %endpoint.queue_url, "resolved queue endpoint");
                SqsConnection {
                    service,
                    endpoint: Some(Arc::new(endpoint)),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "exception while creating SQS connection");
                SqsConnection {
                    service,
                    endpoint: None,
                }
            }
        }
    }

    /// Like [`SqsConnection::connect`] but hands the resolution error back.
    pub async fn try_connect(
        service: Arc<dyn QueueService>,
        settings: &Settings,
    ) -> Result<Self, AwsSqsReceiverError> {
        let endpoint = resolve_endpoint(service.as_ref(), settings).await?;
        Ok(SqsConnection {
            service,
            endpoint: Some(Arc::new(endpoint)),
        })
    }

    pub fn service(&self) -> &Arc<dyn QueueService> {
        &self.service
    }

    pub fn endpoint(&self) -> Option<&QueueEndpoint> {
        self.endpoint.as_deref()
    }

    pub fn queue_url(&self) -> Option<&str> {
        self.endpoint().map(|e| e.queue_url.as_str())
    }
}

/// Looks the queue up, creating it first when `queue.ensure_exists` is set and
/// the service says the queue does not exist. Any other lookup error is
/// returned unchanged.
pub async fn resolve_endpoint(
    service: &dyn QueueService,
    settings: &Settings,
) -> Result<QueueEndpoint, AwsSqsReceiverError> {
    let queue_name = &settings.queue.name;

    let queue_url = match service.get_queue_url(queue_name).await {
        Ok(url) => url,
        Err(e) if settings.queue.ensure_exists && e.is_queue_missing() => {
            tracing::info!(queue_name = %queue_name, "queue not found, creating it");
            service
                .create_queue(
                    queue_name,
                    Duration::from_secs(u64::from(settings.queue.visibility_timeout_seconds)),
                )
                .await?
        }
        Err(e) => return Err(e),
    };

    Ok(QueueEndpoint {
        region: settings.aws.region.clone(),
        queue_name: queue_name.clone(),
        queue_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQueueService;
    use crate::message::QueueMessage;
    use crate::service::ReceiveRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lookups fail with a permissions error; create attempts are counted.
    #[derive(Default)]
    struct ForbiddenService {
        create_calls: AtomicUsize,
    }

    fn forbidden(target: &str) -> AwsSqsReceiverError {
        AwsSqsReceiverError::QueueResolutionError {
            queue_name: target.to_string(),
            message: "AccessDenied".to_string(),
        }
    }

    #[async_trait]
    impl QueueService for ForbiddenService {
        async fn get_queue_url(&self, queue_name: &str) -> Result<String, AwsSqsReceiverError> {
            Err(forbidden(queue_name))
        }

        async fn get_visibility_timeout(
            &self,
            queue_url: &str,
        ) -> Result<Duration, AwsSqsReceiverError> {
            Err(forbidden(queue_url))
        }

        async fn create_queue(
            &self,
            queue_name: &str,
            _visibility_timeout: Duration,
        ) -> Result<String, AwsSqsReceiverError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Err(forbidden(queue_name))
        }

        async fn receive_messages(
            &self,
            queue_url: &str,
            _request: ReceiveRequest,
        ) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
            Err(forbidden(queue_url))
        }

        async fn send_message(
            &self,
            queue_url: &str,
            _body: &str,
        ) -> Result<String, AwsSqsReceiverError> {
            Err(forbidden(queue_url))
        }

        async fn delete_message(
            &self,
            queue_url: &str,
            _receipt_handle: &str,
        ) -> Result<(), AwsSqsReceiverError> {
            Err(forbidden(queue_url))
        }
    }

    #[tokio::test]
    async fn connect_resolves_existing_queue() {
        let service = Arc::new(InMemoryQueueService::new());
        service.create_queue("orders", Duration::from_secs(30)).await.unwrap();

        let connection = SqsConnection::connect(service, &Settings::for_queue("orders")).await;
        let endpoint = connection.endpoint().unwrap();
        assert_eq!(endpoint.queue_name, "orders");
        assert_eq!(endpoint.region, "us-east-1");
        assert_eq!(endpoint.queue_url, InMemoryQueueService::queue_url("orders"));
    }

    #[tokio::test]
    async fn connect_leaves_endpoint_empty_on_failure() {
        let service = Arc::new(InMemoryQueueService::new());
        let connection = SqsConnection::connect(service, &Settings::for_queue("missing")).await;
        assert!(connection.endpoint().is_none());
        assert!(connection.queue_url().is_none());
    }

    #[tokio::test]
    async fn try_connect_reports_failure() {
        let service = Arc::new(InMemoryQueueService::new());
        let result = SqsConnection::try_connect(service, &Settings::for_queue("missing")).await;
        assert!(matches!(
            result,
            Err(AwsSqsReceiverError::QueueDoesNotExist { .. })
        ));
    }

    #[tokio::test]
    async fn ensure_exists_does_not_create_after_other_lookup_failures() {
        let service = Arc::new(ForbiddenService::default());
        let mut settings = Settings::for_queue("locked");
        settings.queue.ensure_exists = true;

        let result = SqsConnection::try_connect(service.clone(), &settings).await;
        assert!(matches!(
            result,
            Err(AwsSqsReceiverError::QueueResolutionError { ref message, .. }) if message == "AccessDenied"
        ));
        assert_eq!(service.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ensure_exists_creates_missing_queue() {
        let service = Arc::new(InMemoryQueueService::new());
        let mut settings = Settings::for_queue("fresh");
        settings.queue.ensure_exists = true;

        let connection = SqsConnection::try_connect(service.clone(), &settings).await.unwrap();
        assert_eq!(
            connection.queue_url(),
            Some(InMemoryQueueService::queue_url("fresh").as_str())
        );
        assert!(service.get_queue_url("fresh").await.is_ok());
    }
}
