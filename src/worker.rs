//! Worker process lifecycle.
//!
//! Startup order: database pool (lazy), optional schema bootstrap, broker
//! connection and queue declaration, then consumption until the shutdown token
//! fires. Broker resources are closed after in-flight deliveries drain.

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::diesel_runtime::{Database, DieselContactStore};
use crate::nats::{DeadLetterSink, DeliveryHandler, NatsClient, QueueConsumer};
use crate::pipeline::ContactPipeline;

/// Run the worker until `shutdown` is cancelled.
///
/// Errors returned from here are startup errors; message-level failures never
/// escape the consumer.
pub async fn run(config: WorkerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;

    let database = Database::new_with_config(&config.database_url, config.database());
    if config.ensure_schema {
        let db = database.clone();
        tokio::task::spawn_blocking(move || db.ensure_schema())
            .await
            .context("schema bootstrap task failed")?
            .map_err(|e| anyhow::anyhow!(e))
            .context("failed to create the contatos table")?;
    } else {
        let db = database.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = db.test_connection() {
                tracing::warn!(error = %e, "Database is not reachable yet, inserts will be retried");
            }
        });
    }

    let client = NatsClient::connect(config.nats())
        .await
        .context("failed to start the queue consumer")?;

    let store = Arc::new(DieselContactStore::new(database));
    let pipeline = ContactPipeline::new(store, config.rules());
    let dead_letters = client
        .dead_letters()
        .map(|sink| Arc::new(sink) as Arc<dyn DeadLetterSink>);
    let handler = DeliveryHandler::new(pipeline, config.redelivery(), dead_letters, config.queue.clone());
    let consumer = QueueConsumer::new(Arc::new(handler), config.consumer());

    let messages = match client.messages().await {
        Ok(messages) => messages,
        Err(e) => {
            client.close().await;
            return Err(e).context("failed to subscribe to the queue");
        }
    };
    consumer.run(messages, shutdown).await;

    tracing::info!("Stopping contact consumer");
    client.close().await;
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}
