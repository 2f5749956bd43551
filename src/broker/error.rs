//! Error taxonomy for broker operations.

use thiserror::Error;

/// Failures reported by a [`Broker`](super::Broker) implementation.
///
/// The three variants have distinct blast radii: `Connect` is fatal to the
/// owning process at startup, `Publish` is recoverable and caller-specific,
/// `Consume` is fatal to the worker whose queue it came from.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Connection could not be established within the bounded retry budget.
    #[error("broker connection failed after {attempts} attempt(s): {reason}")]
    Connect { attempts: u32, reason: String },

    /// Topology declaration or send failed for one message.
    #[error("publish to {destination} failed: {reason}")]
    Publish { destination: String, reason: String },

    /// The delivery stream broke or could not be established.
    #[error("consume from {src} failed: {reason}")]
    Consume { src: String, reason: String },
}
