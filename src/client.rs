use std::collections::HashMap;
use std::path::Path;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::config::{Credentials, SharedCredentialsProvider};

use crate::errors::AwsSqsReceiverError;
use crate::settings::{CredentialsSource, Settings};

/// Creates an AWS SQS client using credentials and configuration from the environment.
///
/// This function loads AWS configuration from environment variables such as:
/// - `AWS_ACCESS_KEY_ID`
/// - `AWS_SECRET_ACCESS_KEY`
/// - `AWS_REGION`
/// - `AWS_PROFILE`
///
/// # Example
///
/// ```rust,no_run
/// use sqs_poller::client::create_sqs_client_from_env;
///
/// #[tokio::main]
/// async fn main() {
///     let client = create_sqs_client_from_env().await;
///     // Use the client...
/// }
/// ```
pub async fn create_sqs_client_from_env() -> aws_sdk_sqs::Client {
    let config = aws_config::load_from_env().await;
    aws_sdk_sqs::Client::new(&config)
}

/// Creates an AWS SQS client with explicitly provided credentials and region.
///
/// # Arguments
///
/// * `access_key_id` - The AWS access key ID
/// * `secret_access_key` - The AWS secret access key
/// * `session_token` - Optional STS session token
/// * `region` - The AWS region (e.g., "us-east-1", "eu-west-1")
pub async fn create_sqs_client_with_credentials(
    access_key_id: &str,
    secret_access_key: &str,
    session_token: Option<String>,
    region: &str,
) -> aws_sdk_sqs::Client {
    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        session_token,
        None,
        "properties-file",
    );

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(SharedCredentialsProvider::new(credentials))
        .load()
        .await;

    aws_sdk_sqs::Client::new(&config)
}

/// Creates the client described by `settings`.
///
/// A configured credentials file takes precedence; otherwise the SDK default
/// provider chain is used for the configured region.
pub async fn create_sqs_client(
    settings: &Settings,
) -> Result<aws_sdk_sqs::Client, AwsSqsReceiverError> {
    match settings.credentials_source() {
        CredentialsSource::PropertiesFile(path) => {
            let creds = read_credentials_file(&path)?;
            tracing::info!(path = %path.display(), region = %settings.aws.region, "using credentials file");
            Ok(create_sqs_client_with_credentials(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token,
                &settings.aws.region,
            )
            .await)
        }
        CredentialsSource::DefaultChain => {
            tracing::info!(region = %settings.aws.region, "using default credentials chain");
            let config = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(settings.aws.region.clone()))
                .load()
                .await;
            Ok(aws_sdk_sqs::Client::new(&config))
        }
    }
}

/// Static credentials read from a properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Reads `accessKey`, `secretKey` and optionally `sessionToken` from a
/// `key=value` properties file. `#` and `!` start comment lines.
pub fn read_credentials_file(path: &Path) -> Result<FileCredentials, AwsSqsReceiverError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| AwsSqsReceiverError::CredentialsError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    parse_credentials(&contents).map_err(|message| AwsSqsReceiverError::CredentialsError {
        path: path.display().to_string(),
        message,
    })
}

fn parse_credentials(contents: &str) -> Result<FileCredentials, String> {
    let properties: HashMap<&str, &str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once(['=', ':']))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    let required = |key: &str| {
        properties
            .get(key)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .ok_or_else(|| format!("missing property '{}'", key))
    };

    Ok(FileCredentials {
        access_key_id: required("accessKey")?,
        secret_access_key: required("secretKey")?,
        session_token: properties
            .get("sessionToken")
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_properties_with_comments() {
        let creds = parse_credentials(
            "# aws credentials\naccessKey = AKIAEXAMPLE\n! legacy comment\nsecretKey=s3cr3t\n",
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "s3cr3t");
        assert_eq!(creds.session_token, None);
    }

    #[test]
    fn missing_secret_key_is_reported() {
        let err = parse_credentials("accessKey=AKIAEXAMPLE\n").unwrap_err();
        assert_eq!(err, "missing property 'secretKey'");
    }

    #[test]
    fn unreadable_file_is_credentials_error() {
        let err = read_credentials_file(Path::new("/nonexistent/credentials.properties"))
            .unwrap_err();
        assert!(matches!(err, AwsSqsReceiverError::CredentialsError { .. }));
    }

    #[test]
    fn reads_session_token_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "accessKey=AKIA\nsecretKey=secret\nsessionToken=token").unwrap();

        let creds = read_credentials_file(file.path()).unwrap();
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }
}
