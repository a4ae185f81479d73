//! # SQS Poller
//!
//! A small AWS SQS client: it resolves a queue once at startup, long-polls it
//! on a fixed interval and prints every message it receives. A session layer
//! adds client-side acknowledge modes (auto, client/ordered, unordered) on top
//! of plain SQS deletes, and a scripted demo shows how those modes differ.
//!
//! ## Features
//!
//! - Single long-poll receive with explicit success/failure results
//! - Polling loop with a shutdown token checked between iterations
//! - Settings from file and environment with one credentials precedence rule
//! - In-memory queue service for tests and local runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sqs_poller::{
//!     client::create_sqs_client,
//!     connection::SqsConnection,
//!     receiver::{PollingRunner, SqsMessageReceiver, print_message},
//!     settings::Settings,
//!     shutdown::shutdown_channel,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::for_queue("employees");
//!     let client = create_sqs_client(&settings).await?;
//!     let connection = SqsConnection::connect(Arc::new(client), &settings).await;
//!     let receiver = SqsMessageReceiver::new(connection, settings.receiver.clone());
//!
//!     let (_stop, token) = shutdown_channel();
//!     PollingRunner::new(receiver, print_message, (), Duration::from_secs(1))
//!         .run(token)
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod demo;
pub mod errors;
pub mod memory;
pub mod message;
pub mod receiver;
pub mod service;
pub mod session;
pub mod settings;
pub mod shutdown;
