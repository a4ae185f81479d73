use std::future::Future;
use std::time::Duration;

use crate::errors::AwsSqsReceiverError;
use crate::message::QueueMessage;
use crate::receiver::MessageSource;
use crate::shutdown::ShutdownToken;

/// Counters reported when a polling loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollingStats {
    /// Receive attempts made.
    pub iterations: u64,
    /// Messages handed to the handler.
    pub messages: u64,
    /// Receive attempts that failed.
    pub failed_receives: u64,
    /// Handler invocations that returned an error.
    pub failed_handlers: u64,
}

/// Default handler: prints the message to standard output.
///
/// The `empId` attribute is only logged; nothing else is done with it.
pub async fn print_message(message: QueueMessage, _shared: ()) -> Result<(), AwsSqsReceiverError> {
    let emp_id = message.emp_id().unwrap_or_default();
    tracing::debug!(message_id = %message.message_id, emp_id = %emp_id, "received message");
    println!("{}", message);
    Ok(())
}

/// Repeatedly receives from a [`MessageSource`] and hands each message to a handler.
///
/// This struct wraps a user-provided function and shared resources. One
/// iteration is: receive once, run the handler for every returned message in
/// order, then sleep for the poll interval. The loop has no exit of its own;
/// it only stops when its [`ShutdownToken`] fires.
///
/// # Type Parameters
///
/// * `S` - The message source, usually [`crate::receiver::SqsMessageReceiver`]
/// * `RFn` - The message handler function type
/// * `Fut` - The future returned by the handler function
/// * `TShared` - The type of shared resources passed to the handler
pub struct PollingRunner<S, RFn, Fut, TShared>
where
    S: MessageSource,
    RFn: Fn(QueueMessage, TShared) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AwsSqsReceiverError>> + Send + 'static,
    TShared: Send + Sync + Clone + 'static,
{
    source: S,
    rv_fn: RFn,
    shared_resources: TShared,
    interval: Duration,
}

impl<S, RFn, Fut, TShared> PollingRunner<S, RFn, Fut, TShared>
where
    S: MessageSource,
    RFn: Fn(QueueMessage, TShared) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AwsSqsReceiverError>> + Send + 'static,
    TShared: Send + Sync + Clone + 'static,
{
    /// Creates a new polling runner.
    ///
    /// # Arguments
    ///
    /// * `source` - Where messages come from
    /// * `rv_fn` - The message handler function
    /// * `shared_resources` - Resources shared between message processing calls
    /// * `interval` - Sleep between two receive calls
    pub fn new(source: S, rv_fn: RFn, shared_resources: TShared, interval: Duration) -> Self {
        PollingRunner {
            source,
            rv_fn,
            shared_resources,
            interval,
        }
    }

    /// Runs the loop until `shutdown` fires.
    ///
    /// Shutdown is observed between iterations and while sleeping; an
    /// in-flight receive call is always allowed to finish.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> PollingStats {
        let mut stats = PollingStats::default();

        while !shutdown.is_shutdown() {
            stats.iterations += 1;

            match self.source.receive().await {
                Ok(messages) => {
                    if messages.is_empty() {
                        tracing::debug!("no messages received");
                    }
                    for message in messages {
                        stats.messages += 1;
                        let message_id = message.message_id.clone();
                        if let Err(e) = (self.rv_fn)(message, self.shared_resources.clone()).await
                        {
                            stats.failed_handlers += 1;
                            tracing::error!(message_id = %message_id, error = %e, "error handling message");
                        }
                    }
                }
                Err(e) => {
                    stats.failed_receives += 1;
                    tracing::error!(error = %e, "error receiving messages");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        tracing::info!(
            iterations = stats.iterations,
            messages = stats.messages,
            failed_receives = stats.failed_receives,
            "polling stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_channel;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Mutex;

    /// Returns one message per call, numbered by call.
    struct OneMessageSource {
        calls: AtomicU64,
    }

    #[async_trait]
    impl MessageSource for OneMessageSource {
        async fn receive(&self) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![QueueMessage::new(
                &format!("m-{}", n),
                &format!("body {}", n),
                &format!("rh-{}", n),
            )])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MessageSource for FailingSource {
        async fn receive(&self) -> Result<Vec<QueueMessage>, AwsSqsReceiverError> {
            Err(AwsSqsReceiverError::QueueNotResolved)
        }
    }

    type Seen = Arc<Mutex<Vec<String>>>;

    async fn record(message: QueueMessage, seen: Seen) -> Result<(), AwsSqsReceiverError> {
        seen.lock().await.push(message.body);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn handles_one_message_per_iteration_and_keeps_running() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let source = OneMessageSource {
            calls: AtomicU64::new(0),
        };
        let runner = PollingRunner::new(source, record, seen.clone(), Duration::from_millis(100));
        let (sender, token) = shutdown_channel();

        let task = tokio::spawn(async move { runner.run(token).await });

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(!task.is_finished(), "runner must not stop on its own");
        assert_eq!(
            *seen.lock().await,
            vec!["body 1", "body 2", "body 3", "body 4", "body 5"]
        );

        sender.shutdown();
        let stats = task.await.unwrap();
        assert_eq!(stats.iterations, 5);
        assert_eq!(stats.messages, 5);
        assert_eq!(stats.failed_receives, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn receive_failures_are_counted_not_fatal() {
        let runner = PollingRunner::new(
            FailingSource,
            |_message: QueueMessage, _: ()| async { Ok::<(), AwsSqsReceiverError>(()) },
            (),
            Duration::from_secs(1),
        );
        let (sender, token) = shutdown_channel();
        let task = tokio::spawn(async move { runner.run(token).await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!task.is_finished());

        sender.shutdown();
        let stats = task.await.unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.failed_receives, 3);
        assert_eq!(stats.messages, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_errors_do_not_stop_the_loop() {
        let source = OneMessageSource {
            calls: AtomicU64::new(0),
        };
        let runner = PollingRunner::new(
            source,
            |_message: QueueMessage, _: ()| async {
                Err::<(), _>(AwsSqsReceiverError::GenericError(
                    "handler failed".to_string().into(),
                ))
            },
            (),
            Duration::from_secs(1),
        );
        let (sender, token) = shutdown_channel();
        let task = tokio::spawn(async move { runner.run(token).await });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        sender.shutdown();
        let stats = task.await.unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.failed_handlers, 2);
    }

    #[tokio::test]
    async fn already_signalled_token_runs_no_iterations() {
        let (sender, token) = shutdown_channel();
        sender.shutdown();

        let runner = PollingRunner::new(FailingSource, print_message, (), Duration::from_secs(60));
        let stats = runner.run(token).await;
        assert_eq!(stats, PollingStats::default());
    }
}
