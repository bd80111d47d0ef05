//! Payment webhook boundary: signature check, typed events, and the
//! credit allowance each plan grants.
//!
//! Payloads have the shape `{"type": "<kind>", "data": {...}}` and are
//! parsed into [`PaymentEvent`]. Unknown kinds are rejected here rather
//! than passed along as loose JSON.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::CoreError;
use crate::plan::Plan;
use crate::types::{Credits, DbId};

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// All payment events the platform reacts to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    #[serde(rename = "checkout.completed")]
    CheckoutCompleted(SubscriptionData),

    #[serde(rename = "subscription.renewed")]
    SubscriptionRenewed(SubscriptionData),

    #[serde(rename = "subscription.cancelled")]
    SubscriptionCancelled(SubscriptionData),

    #[serde(rename = "payment.failed")]
    PaymentFailed(PaymentFailedData),
}

/// Payload shared by checkout and subscription lifecycle events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionData {
    /// Provider event id; unique per delivery.
    pub event_id: String,
    pub user_id: DbId,
    pub plan: Plan,
    pub subscription_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentFailedData {
    pub event_id: String,
    pub user_id: DbId,
    pub subscription_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PaymentEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::CheckoutCompleted(d)
            | Self::SubscriptionRenewed(d)
            | Self::SubscriptionCancelled(d) => &d.event_id,
            Self::PaymentFailed(d) => &d.event_id,
        }
    }

    pub fn user_id(&self) -> DbId {
        match self {
            Self::CheckoutCompleted(d)
            | Self::SubscriptionRenewed(d)
            | Self::SubscriptionCancelled(d) => d.user_id,
            Self::PaymentFailed(d) => d.user_id,
        }
    }
}

/// Parse a webhook body into a typed event.
pub fn parse_payment_event(body: &str) -> Result<PaymentEvent, CoreError> {
    serde_json::from_str(body)
        .map_err(|e| CoreError::Validation(format!("Malformed payment event: {e}")))
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Verify a hex-encoded HMAC-SHA256 signature over the raw body.
///
/// Comparison is constant-time. Malformed hex is treated as a mismatch.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Some(expected) = decode_hex(signature_hex.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex signature for a body. Used by tests and tooling.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

// ---------------------------------------------------------------------------
// Credit grants
// ---------------------------------------------------------------------------

/// Credits added to a balance when a plan is purchased or renewed.
pub fn monthly_allowance(plan: Plan) -> Credits {
    match plan {
        Plan::Free => 0,
        Plan::Basic => 1_000,
        Plan::Pro => 5_000,
        Plan::Business => 15_000,
    }
}

/// A credit top-up derived from a payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrant {
    pub user_id: DbId,
    pub amount: Credits,
    pub plan: Plan,
    /// Idempotency key; one grant per provider event.
    pub reference_id: String,
}

/// The grant an event entitles the user to, if any.
pub fn credit_grant_for(event: &PaymentEvent) -> Option<CreditGrant> {
    match event {
        PaymentEvent::CheckoutCompleted(d) | PaymentEvent::SubscriptionRenewed(d) => {
            let amount = monthly_allowance(d.plan);
            (amount > 0).then(|| CreditGrant {
                user_id: d.user_id,
                amount,
                plan: d.plan,
                reference_id: format!("payment:{}", d.event_id),
            })
        }
        PaymentEvent::SubscriptionCancelled(_) | PaymentEvent::PaymentFailed(_) => None,
    }
}
