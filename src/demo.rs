//! Scripted acknowledge-mode demonstration.
//!
//! Two messages are sent, two are received but only the second is
//! acknowledged, then the demo waits out the visibility timeout and receives
//! once more. With [`AcknowledgeMode::UnorderedAcknowledge`] the first
//! message comes back; with [`AcknowledgeMode::ClientAcknowledge`] it was
//! acknowledged along with the second one, so nothing comes back.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::AwsSqsReceiverError;
use crate::service::QueueService;
use crate::session::{AcknowledgeMode, Consumer, SqsSession};
use crate::settings::Settings;

pub const FIRST_MESSAGE: &str = "Message 1";
pub const SECOND_MESSAGE: &str = "Message 2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSettings {
    pub queue_name: String,
    pub mode: AcknowledgeMode,
    /// Long-poll wait for each receive step.
    pub wait_time: Duration,
    /// Applied only when the demo has to create the queue.
    pub visibility_timeout: Duration,
}

impl DemoSettings {
    pub fn from_settings(settings: &Settings, mode: AcknowledgeMode) -> Self {
        DemoSettings {
            queue_name: settings.queue.name.clone(),
            mode,
            wait_time: Duration::from_secs(settings.receiver.wait_time_seconds.max(0) as u64),
            visibility_timeout: Duration::from_secs(u64::from(
                settings.queue.visibility_timeout_seconds,
            )),
        }
    }
}

/// What each receive step of the demo returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub mode: AcknowledgeMode,
    /// The queue's own visibility timeout, which the demo waited out.
    pub visibility_timeout: Duration,
    /// Received and left unacknowledged.
    pub unacknowledged: Option<String>,
    /// Received and acknowledged.
    pub acknowledged: Option<String>,
    /// Received (and acknowledged) after the visibility timeout.
    pub after_visibility_timeout: Option<String>,
}

/// Runs the demonstration. Any failing step aborts the run after logging it;
/// the session is only closed when every step succeeded.
pub async fn run_acknowledge_demo(
    service: Arc<dyn QueueService>,
    settings: &DemoSettings,
) -> Result<DemoReport, AwsSqsReceiverError> {
    let result = run_steps(service, settings).await;
    if let Err(e) = &result {
        tracing::error!(mode = %settings.mode, error = %e, "acknowledge demo aborted");
    }
    result
}

async fn run_steps(
    service: Arc<dyn QueueService>,
    settings: &DemoSettings,
) -> Result<DemoReport, AwsSqsReceiverError> {
    let session = SqsSession::new(service, settings.mode);
    println!("Session created in {} mode", settings.mode);

    let queue = session
        .ensure_queue_exists(&settings.queue_name, settings.visibility_timeout)
        .await?;

    let producer = session.create_producer(&settings.queue_name).await?;
    let consumer = session
        .create_consumer(&settings.queue_name, settings.wait_time)
        .await?;

    producer.send_text(FIRST_MESSAGE).await?;
    producer.send_text(SECOND_MESSAGE).await?;

    let unacknowledged = receive_message(&session, &consumer, false).await?;
    let acknowledged = receive_message(&session, &consumer, true).await?;

    println!(
        "Waiting for visibility timeout ({}s)...",
        queue.visibility_timeout.as_secs()
    );
    tokio::time::sleep(queue.visibility_timeout).await;

    let after_visibility_timeout = receive_message(&session, &consumer, true).await?;

    session.close().await?;
    println!("Connection closed.");

    Ok(DemoReport {
        mode: settings.mode,
        visibility_timeout: queue.visibility_timeout,
        unacknowledged,
        acknowledged,
        after_visibility_timeout,
    })
}

/// Receives one message, prints it and optionally acknowledges it.
async fn receive_message(
    session: &SqsSession,
    consumer: &Consumer,
    acknowledge: bool,
) -> Result<Option<String>, AwsSqsReceiverError> {
    match consumer.receive().await? {
        None => {
            println!("Queue is empty!");
            Ok(None)
        }
        Some(message) => {
            println!("Received: {}", message.text());
            if acknowledge {
                session.acknowledge(&message).await?;
            }
            Ok(Some(message.text().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_queue_and_receiver_config() {
        let mut settings = Settings::for_queue("demo");
        settings.receiver.wait_time_seconds = 2;
        settings.queue.visibility_timeout_seconds = 5;

        let demo = DemoSettings::from_settings(&settings, AcknowledgeMode::ClientAcknowledge);
        assert_eq!(demo.queue_name, "demo");
        assert_eq!(demo.wait_time, Duration::from_secs(2));
        assert_eq!(demo.visibility_timeout, Duration::from_secs(5));
    }
}
