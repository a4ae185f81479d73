use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sqs_poller::client::create_sqs_client;
use sqs_poller::connection::SqsConnection;
use sqs_poller::demo::{DemoSettings, run_acknowledge_demo};
use sqs_poller::receiver::{PollingRunner, SqsMessageReceiver, print_message};
use sqs_poller::service::QueueService;
use sqs_poller::session::AcknowledgeMode;
use sqs_poller::settings::Settings;
use sqs_poller::shutdown::shutdown_channel;

#[derive(Debug, Parser)]
#[command(name = "sqs-poller", version, about = "Poll an SQS queue and print what arrives")]
struct Cli {
    /// Settings file (toml, yaml, json or ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `queue.name` from the settings
    #[arg(long, global = true)]
    queue_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Receive and print messages until interrupted
    Poll,
    /// Show how acknowledge modes change what is redelivered
    AckDemo {
        /// auto, client (ordered) or unordered
        #[arg(long, default_value = "unordered")]
        mode: AcknowledgeMode,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.queue_name.as_deref())?;
    let client = create_sqs_client(&settings).await?;
    let service: Arc<dyn QueueService> = Arc::new(client);

    match cli.command {
        Command::Poll => poll(service, &settings).await,
        Command::AckDemo { mode } => {
            let report =
                run_acknowledge_demo(service, &DemoSettings::from_settings(&settings, mode))
                    .await?;
            match report.after_visibility_timeout {
                Some(text) => println!("{}: '{}' was redelivered", report.mode, text),
                None => println!("{}: nothing was redelivered", report.mode),
            }
        }
    }

    Ok(())
}

async fn poll(service: Arc<dyn QueueService>, settings: &Settings) {
    let connection = SqsConnection::connect(service, settings).await;
    let receiver = SqsMessageReceiver::new(connection, settings.receiver.clone());
    let runner = PollingRunner::new(
        receiver,
        print_message,
        (),
        Duration::from_millis(settings.poller.interval_millis),
    );

    let (sender, token) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current receive");
            sender.shutdown();
        }
    });

    runner.run(token).await;
}
