/// Contact worker - consumes create-contact messages from NATS JetStream and
/// stores them in the relational database.

use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use contact_consumer::config::WorkerConfig;
use contact_consumer::{telemetry, worker};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads them
    dotenv::dotenv().ok();

    let config = WorkerConfig::parse();
    telemetry::init_tracing();

    let shutdown = CancellationToken::new();
    tokio::spawn(worker::shutdown_signal(shutdown.clone()));

    match worker::run(config, shutdown).await {
        Ok(()) => {
            tracing::info!("Contact worker stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "Contact worker failed");
            ExitCode::FAILURE
        }
    }
}
