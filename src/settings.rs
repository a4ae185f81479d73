use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::AwsSqsReceiverError;
use crate::receiver::config::AwsSqsReceiverConfig;

/// Environment variable prefix, e.g. `SQS_POLLER_QUEUE__NAME`.
pub const ENV_PREFIX: &str = "SQS_POLLER";

/// Settings file looked up when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/sqs-poller";

/// Top-level settings, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub aws: AwsSettings,
    pub queue: QueueSettings,
    #[serde(default)]
    pub receiver: AwsSqsReceiverConfig,
    #[serde(default)]
    pub poller: PollerSettings,
}

/// Region and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsSettings {
    #[serde(default = "default_region")]
    pub region: String,

    /// Properties file with `accessKey`/`secretKey`. When set it replaces the
    /// default provider chain entirely.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        AwsSettings {
            region: default_region(),
            credentials_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    pub name: String,

    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u32,

    /// Create the queue when it does not exist yet.
    #[serde(default)]
    pub ensure_exists: bool,
}

impl QueueSettings {
    pub fn new(name: &str) -> Self {
        QueueSettings {
            name: name.to_string(),
            visibility_timeout_seconds: default_visibility_timeout(),
            ensure_exists: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerSettings {
    /// Sleep between two receive calls.
    #[serde(default = "default_interval_millis")]
    pub interval_millis: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        PollerSettings {
            interval_millis: default_interval_millis(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_visibility_timeout() -> u32 {
    30
}

fn default_interval_millis() -> u64 {
    1000
}

/// Where static credentials come from.
///
/// A configured credentials file always wins over the default chain; the two
/// are never combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    DefaultChain,
    PropertiesFile(PathBuf),
}

impl Settings {
    /// Settings for `queue_name` with every other value at its default.
    pub fn for_queue(queue_name: &str) -> Self {
        Settings {
            aws: AwsSettings::default(),
            queue: QueueSettings::new(queue_name),
            receiver: AwsSqsReceiverConfig::default(),
            poller: PollerSettings::default(),
        }
    }

    /// Loads settings from an optional file, then environment variables.
    ///
    /// `queue_name` overrides whatever the file or environment say.
    pub fn load(
        config_file: Option<&Path>,
        queue_name: Option<&str>,
    ) -> Result<Self, AwsSqsReceiverError> {
        let file = match config_file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("queue.name", queue_name.map(str::to_string))?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AwsSqsReceiverError> {
        if self.queue.name.trim().is_empty() {
            return Err(AwsSqsReceiverError::ConfigError(
                "queue.name must not be empty".to_string(),
            ));
        }
        if self.aws.region.trim().is_empty() {
            return Err(AwsSqsReceiverError::ConfigError(
                "aws.region must not be empty".to_string(),
            ));
        }
        // SQS caps the visibility timeout at 12 hours.
        if self.queue.visibility_timeout_seconds > 43_200 {
            return Err(AwsSqsReceiverError::ConfigError(format!(
                "queue.visibility_timeout_seconds must be at most 43200, got {}",
                self.queue.visibility_timeout_seconds
            )));
        }
        self.receiver.validate()
    }

    pub fn credentials_source(&self) -> CredentialsSource {
        match &self.aws.credentials_file {
            Some(path) => CredentialsSource::PropertiesFile(path.clone()),
            None => CredentialsSource::DefaultChain,
        }
    }
}
