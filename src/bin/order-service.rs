//! Order service binary: HTTP API + payment-response consumer.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use order_relay::broker::{stop_channel, AmqpBroker, Broker};
use order_relay::order::{Customer, Product};
use order_relay::store::{InMemoryStore, Store, StoreError};
use order_relay::{Config, CorrelationHandler, OrderService};

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

    let store = Arc::new(InMemoryStore::new());
    seed_reference_data(store.as_ref()).await?;
    info!("reference data seeded");

    let orders = OrderService::new(store.clone(), broker.clone(), config.routes.clone());

    let (stop_handle, stop_token) = stop_channel();
    let correlation = Arc::new(CorrelationHandler::new(store.clone()));
    let mut consumer = tokio::spawn({
        let broker: Arc<dyn Broker> = broker.clone();
        let queue = config.routes.payment_responses.clone();
        async move { correlation.run(broker, &queue, stop_token).await }
    });

    let result = tokio::select! {
        served = order_relay::http::serve(orders, &config.http.listen_addr) => {
            served.context("http server failed")
        }
        consumed = &mut consumer => {
            // No consumer means payment responses go nowhere: fatal.
            match consumed {
                Ok(Ok(())) => Err(anyhow::anyhow!("payment-response consumer exited unexpectedly")),
                Ok(Err(e)) => {
                    error!(error = %e, "payment-response consumer failed");
                    Err(e.into())
                }
                Err(e) => Err(e).context("payment-response consumer panicked"),
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

/// Seed one product and one customer so a fresh system is usable, tolerating
/// a store that was already seeded.
async fn seed_reference_data(store: &dyn Store) -> anyhow::Result<()> {
    let seeded_product = store
        .create_product(Product {
            id: "1".to_string(),
            name: "Iphone".to_string(),
            price: 199.0,
        })
        .await;
    ignore_already_exists(seeded_product)?;

    let seeded_customer = store
        .create_customer(Customer {
            id: "1".to_string(),
            name: "Luke Skywalker".to_string(),
            email: "mail@naboo.com".to_string(),
        })
        .await;
    ignore_already_exists(seeded_customer)?;

    Ok(())
}

fn ignore_already_exists(result: Result<(), StoreError>) -> anyhow::Result<()> {
    match result {
        Ok(()) | Err(StoreError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
