use serde::Deserialize;

use crate::errors::AwsSqsReceiverError;

/// Longest long-poll wait SQS accepts.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Largest batch a single receive call may return.
pub const MAX_BATCH_SIZE: i32 = 10;

/// Configuration for the AWS SQS receiver.
///
/// This struct defines the parameters for receiving messages from an SQS queue,
/// including the maximum number of messages to receive and the wait time for long polling.
///
/// # Fields
/// - `max_number_of_messages`: The maximum number of messages to receive in a single request.
/// - `wait_time_seconds`: The wait time for long polling, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AwsSqsReceiverConfig {
    /// The maximum number of messages to receive in a single request.
    pub max_number_of_messages: i32,

    /// The wait time for long polling, in seconds.
    pub wait_time_seconds: i32,
}

impl AwsSqsReceiverConfig {
    pub fn new(max_number_of_messages: i32, wait_time_seconds: i32) -> Self {
        AwsSqsReceiverConfig {
            max_number_of_messages,
            wait_time_seconds,
        }
    }

    /// Checks both values against the limits SQS enforces.
    pub fn validate(&self) -> Result<(), AwsSqsReceiverError> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_number_of_messages) {
            return Err(AwsSqsReceiverError::ConfigError(format!(
                "receiver.max_number_of_messages must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.max_number_of_messages
            )));
        }
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(AwsSqsReceiverError::ConfigError(format!(
                "receiver.wait_time_seconds must be between 0 and {}, got {}",
                MAX_WAIT_TIME_SECONDS, self.wait_time_seconds
            )));
        }
        Ok(())
    }
}

impl Default for AwsSqsReceiverConfig {
    fn default() -> Self {
        AwsSqsReceiverConfig {
            max_number_of_messages: 10,
            wait_time_seconds: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(AwsSqsReceiverConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_values_outside_sqs_limits() {
        assert!(AwsSqsReceiverConfig::new(0, 20).validate().is_err());
        assert!(AwsSqsReceiverConfig::new(11, 20).validate().is_err());
        assert!(AwsSqsReceiverConfig::new(10, -1).validate().is_err());
        assert!(AwsSqsReceiverConfig::new(10, 21).validate().is_err());
        assert!(AwsSqsReceiverConfig::new(1, 0).validate().is_ok());
    }
}
