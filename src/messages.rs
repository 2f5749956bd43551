//! Wire messages exchanged between the order service and the payment worker.
//!
//! Both shapes are a stable JSON contract; field names are camelCase on the
//! wire. The payment outcome travels as a plain string so that a response
//! carrying an unrecognized value can be detected and discarded instead of
//! failing as malformed JSON; the two cases are logged differently.

use serde::{Deserialize, Serialize};

/// Outcome vocabulary for a payment response. Exactly two values are valid
/// on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Failed,
}

impl PaymentOutcome {
    /// The wire spelling of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Success => "success",
            PaymentOutcome::Failed => "failed",
        }
    }

    /// Parse a wire value. Returns `None` for anything outside the two-value
    /// vocabulary.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(PaymentOutcome::Success),
            "failed" => Some(PaymentOutcome::Failed),
            _ => None,
        }
    }
}

/// Request for payment of one order. Constructed once at order creation and
/// never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: String,
    pub total_price: f64,
}

/// Response to a [`PaymentRequest`], correlated back through broker metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub order_id: String,
    pub payment_status: String,
}

impl PaymentResponse {
    /// Build a response with a valid outcome value.
    pub fn new(order_id: &str, outcome: PaymentOutcome) -> Self {
        Self {
            order_id: order_id.to_string(),
            payment_status: outcome.as_str().to_string(),
        }
    }

    /// The parsed outcome, or `None` when the wire value is unrecognized.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        PaymentOutcome::parse(&self.payment_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_request_wire_shape() {
        let request = PaymentRequest {
            order_id: "order-1".to_string(),
            total_price: 500.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "orderId": "order-1", "totalPrice": 500.0 }));
    }

    #[test]
    fn payment_response_wire_shape() {
        let response = PaymentResponse::new("order-1", PaymentOutcome::Success);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "orderId": "order-1", "paymentStatus": "success" })
        );
    }

    #[test]
    fn outcome_parses_the_two_valid_values() {
        assert_eq!(PaymentOutcome::parse("success"), Some(PaymentOutcome::Success));
        assert_eq!(PaymentOutcome::parse("failed"), Some(PaymentOutcome::Failed));
    }

    #[test]
    fn unrecognized_outcome_is_detectable() {
        let response: PaymentResponse =
            serde_json::from_str(r#"{"orderId":"order-1","paymentStatus":"maybe"}"#).unwrap();
        assert_eq!(response.outcome(), None);
    }
}
