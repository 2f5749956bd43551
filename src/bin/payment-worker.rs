//! Payment worker binary: consumes payment requests, replies with outcomes.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use order_relay::broker::{stop_channel, AmqpBroker, Broker};
use order_relay::{Config, PaymentWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let broker = Arc::new(
        AmqpBroker::connect(&config.broker.url)
            .await
            .context("broker connection is fatal at startup")?,
    );

    let worker = Arc::new(PaymentWorker::new(broker.clone(), config.payment.clone()));

    let (stop_handle, stop_token) = stop_channel();
    let mut consumer = tokio::spawn({
        let worker = Arc::clone(&worker);
        let queue = config.routes.payment_requests.clone();
        async move { worker.run(&queue, stop_token).await }
    });

    info!(queue = %config.routes.payment_requests, "processing payment requests");

    let result = tokio::select! {
        consumed = &mut consumer => {
            match consumed {
                Ok(Ok(())) => Err(anyhow::anyhow!("payment-request consumer exited unexpectedly")),
                Ok(Err(e)) => {
                    error!(error = %e, "payment-request consumer failed");
                    Err(e.into())
                }
                Err(e) => Err(e).context("payment-request consumer panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            stop_handle.stop();
            let _ = consumer.await;
            Ok(())
        }
    };

    broker.close().await;
    result
}
