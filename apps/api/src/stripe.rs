//! # Stripe Webhook Signatures
//!
//! ```text
//! stripe-signature: t=1760600000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//!
//! expected = hex(HMAC-SHA256(endpoint_secret, "{t}.{raw body}"))
//! accept  ⇔  some v1 == expected (constant time)  ∧  |now − t| ≤ 300s
//! ```
//!
//! The raw body must be verified before it is parsed.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum clock difference between Stripe and us.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("stripe-signature header is malformed")]
    Malformed,

    #[error("stripe-signature timestamp is outside the tolerance")]
    Expired,

    #[error("no stripe-signature matches the payload")]
    Mismatch,
}

/// Verifies `header` against `payload` at unix time `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    let age = now
        .checked_sub(timestamp)
        .map(i64::unsigned_abs)
        .ok_or(SignatureError::Expired)?;
    if age > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(candidate) = hex::decode(candidate) else {
            return false;
        };
        // verify_slice compares in constant time
        signed_payload_mac(secret, timestamp, payload)
            .map(|mac| mac.verify_slice(&candidate).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Builds a `stripe-signature` header value.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let mac = signed_payload_mac(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_payload_mac(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

// =============================================================================
// Event Payloads
// =============================================================================

/// The parts of a Stripe event the API reads.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// `metadata.booking_id` of the event object.
    pub fn booking_id(&self) -> Option<&str> {
        self.data
            .object
            .get("metadata")
            .and_then(|m| m.get("booking_id"))
            .and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn test_valid_signature() {
        let header = sign(BODY, SECRET, 1_000).unwrap();
        assert_eq!(verify_signature(BODY, &header, SECRET, 1_100), Ok(()));
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign(BODY, SECRET, 1_000).unwrap();
        let v1 = good.split_once(",v1=").unwrap().1;
        let header = format!("t=1000,v1={},v1={}", "00".repeat(32), v1);
        assert_eq!(verify_signature(BODY, &header, SECRET, 1_000), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(BODY, SECRET, 1_000).unwrap();
        let result = verify_signature(b"{}", &header, SECRET, 1_000);
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(BODY, "whsec_other", 1_000).unwrap();
        let result = verify_signature(BODY, &header, SECRET, 1_000);
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = sign(BODY, SECRET, 1_000).unwrap();
        let result = verify_signature(BODY, &header, SECRET, 1_000 + 301);
        assert_eq!(result, Err(SignatureError::Expired));
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let now = 1_700_000_000;
        assert_eq!(
            verify_signature(BODY, "t=-9223372036854775808,v1=00", SECRET, now),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(BODY, "t=9223372036854775807,v1=00", SECRET, -now),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_signature(BODY, "v1=abcd", SECRET, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(BODY, "t=1000", SECRET, 1_000),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(BODY, "t=soon,v1=abcd", SECRET, 1_000),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_booking_id_from_metadata() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "metadata": { "booking_id": "b-1" } } }
        }))
        .unwrap();
        assert_eq!(event.booking_id(), Some("b-1"));
    }
}
