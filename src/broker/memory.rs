//! In-memory broker for tests and single-process runs.
//!
//! Implements the same contract as the AMQP client against a set of named
//! in-process queues: declare-on-use topology, correlation and reply-to
//! metadata round-tripped unchanged, strictly sequential (prefetch-1)
//! delivery per queue, and explicit acknowledgment. A delivery the handler
//! releases without acknowledging returns to the front of its queue flagged
//! as redelivered, the same at-least-once behavior a crash between delivery
//! and ack produces on a real broker. That makes handler idempotence
//! testable without one.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::error::BrokerError;
use super::message::Delivery;
use super::stop::StopToken;
use super::{Broker, DeliveryHandler};

/// How long an idle consumer sleeps before re-checking its queue, as a
/// fallback for a publish that raced its wakeup registration.
const IDLE_RECHECK: Duration = Duration::from_millis(25);

#[derive(Clone)]
struct QueuedMessage {
    body: Vec<u8>,
    correlation_id: String,
    reply_to: Option<String>,
    redelivered: bool,
}

#[derive(Default)]
struct Shared {
    queues: Mutex<HashMap<String, VecDeque<QueuedMessage>>>,
    arrived: Notify,
    closed: AtomicBool,
}

/// In-memory broker. `Clone` shares the same queues, so one instance can be
/// handed to every component of a single-process system.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    /// Create a broker with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting on `queue`.
    pub fn queued(&self, queue: &str) -> usize {
        self.shared
            .queues
            .lock()
            .unwrap()
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    fn has_message(&self, queue: &str) -> bool {
        self.queued(queue) > 0
    }

    /// Waiting messages on `queue` as (body, correlation id, reply-to)
    /// triples, for unit tests that assert on published output.
    #[cfg(test)]
    pub(crate) fn snapshot(&self, queue: &str) -> Vec<(Vec<u8>, String, Option<String>)> {
        self.shared
            .queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| (m.body.clone(), m.correlation_id.clone(), m.reply_to.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn pop(&self, queue: &str) -> Option<QueuedMessage> {
        self.shared
            .queues
            .lock()
            .unwrap()
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }

    fn requeue_front(&self, queue: &str, message: QueuedMessage) {
        self.shared
            .queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_front(message);
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(
        &self,
        destination: &str,
        body: &[u8],
        reply_to: Option<&str>,
        correlation_id: &str,
    ) -> Result<(), BrokerError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                destination: destination.to_string(),
                reason: "broker closed".to_string(),
            });
        }

        self.shared
            .queues
            .lock()
            .unwrap()
            .entry(destination.to_string())
            .or_default()
            .push_back(QueuedMessage {
                body: body.to_vec(),
                correlation_id: correlation_id.to_string(),
                reply_to: reply_to.map(str::to_string),
                redelivered: false,
            });
        self.shared.arrived.notify_waiters();
        Ok(())
    }

    async fn consume(
        &self,
        source: &str,
        handler: Arc<dyn DeliveryHandler>,
        mut stop: StopToken,
    ) -> Result<(), BrokerError> {
        // Declare: the queue exists from here on even if nothing was
        // published to it yet.
        self.shared
            .queues
            .lock()
            .unwrap()
            .entry(source.to_string())
            .or_default();

        loop {
            if stop.is_stopped() || self.shared.closed.load(Ordering::SeqCst) {
                return Ok(());
            }

            match self.pop(source) {
                Some(message) => {
                    let acked = Arc::new(AtomicBool::new(false));
                    let delivery = Delivery::from_memory(
                        source,
                        message.body.clone(),
                        message.correlation_id.clone(),
                        message.reply_to.clone(),
                        message.redelivered,
                        Arc::clone(&acked),
                    );
                    // Awaiting the handler before popping the next message
                    // IS the prefetch-1 guarantee.
                    handler.handle(delivery).await;

                    if !acked.load(Ordering::SeqCst) {
                        self.requeue_front(
                            source,
                            QueuedMessage {
                                redelivered: true,
                                ..message
                            },
                        );
                    }
                }
                None => {
                    let arrived = self.shared.arrived.notified();
                    if self.has_message(source) {
                        continue;
                    }
                    tokio::select! {
                        _ = arrived => {}
                        _ = stop.stopped() => return Ok(()),
                        _ = tokio::time::sleep(IDLE_RECHECK) => {}
                    }
                }
            }
        }
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.arrived.notify_waiters();
    }
}
