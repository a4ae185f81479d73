use std::str::FromStr;

use thiserror::Error;

/// Error types for SQS polling, session and configuration operations.
///
/// Every failure the crate can report is represented here, so callers can tell
/// an empty receive apart from a failed one.
#[derive(Debug, Error)]
pub enum AwsSqsReceiverError {
    /// Error that occurs during AWS SQS client initialization.
    #[error("failed to initialize AWS SQS client: {0}")]
    InitializationError(String),

    /// Settings could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// A credentials file was configured but could not be used.
    #[error("failed to read credentials from {path}: {message}")]
    CredentialsError { path: String, message: String },

    /// The queue endpoint was never resolved, so there is nothing to talk to.
    #[error("queue endpoint is not resolved")]
    QueueNotResolved,

    /// The service reported that no queue with this name exists.
    #[error("queue '{queue_name}' does not exist")]
    QueueDoesNotExist { queue_name: String },

    /// Queue lookup or creation failed for any other reason (permissions, throttling, network).
    #[error("failed to resolve queue '{queue_name}': {message}")]
    QueueResolutionError { queue_name: String, message: String },

    /// A receive call failed.
    #[error("failed to receive messages: {0}")]
    ReceiveError(String),

    /// A send call failed.
    #[error("failed to send message: {0}")]
    SendError(String),

    /// Deleting an acknowledged delivery failed.
    #[error("failed to acknowledge message: {0}")]
    AcknowledgeError(String),

    /// The session was closed before this operation.
    #[error("session is closed")]
    SessionClosed,

    /// Anything else, e.g. a poisoned lock in the in-memory service.
    #[error("{0}")]
    GenericError(#[from] GenericError),
}

impl AwsSqsReceiverError {
    /// Returns true only when the service said the queue does not exist.
    ///
    /// Other lookup failures must not be answered by creating the queue.
    pub fn is_queue_missing(&self) -> bool {
        matches!(self, AwsSqsReceiverError::QueueDoesNotExist { .. })
    }
}

impl From<config::ConfigError> for AwsSqsReceiverError {
    fn from(err: config::ConfigError) -> Self {
        AwsSqsReceiverError::ConfigError(err.to_string())
    }
}

/// Generic error type for handling unexpected errors.
#[derive(Debug, Error)]
pub struct GenericError(String);

impl GenericError {
    /// Creates a new `GenericError` with the provided message.
    pub fn new(message: String) -> Self {
        GenericError(message)
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GenericError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(GenericError::new(s.to_string()))
    }
}

impl From<String> for GenericError {
    fn from(s: String) -> Self {
        GenericError::new(s)
    }
}
