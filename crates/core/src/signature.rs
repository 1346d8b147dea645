//! Authenticity and freshness checks for inbound marketplace webhooks.
//!
//! The marketplace signs `authorization + url + timestamp + body` with
//! HMAC-SHA256 using the partner key shared by every tenant of the
//! integration. The freshness check runs first and is independent of the
//! HMAC. Every failure mode (stale or unparseable timestamp, missing
//! partner key, malformed hex) is reported as `false`, never as a fault,
//! so the receiver can always answer the caller.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum distance, in seconds, between the timestamp claim and now.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Why a webhook failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The timestamp claim is unparseable or outside the tolerance window.
    #[error("Webhook timestamp is invalid or outside the allowed window")]
    StaleTimestamp,

    /// The signature does not match the request, or no partner key is configured.
    #[error("Webhook signature is invalid")]
    InvalidSignature,
}

/// Verifies webhook signatures for one marketplace partner.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    partner_key: Option<String>,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    /// Create a verifier. A `None` key makes every signature check fail.
    pub fn new(partner_key: Option<String>) -> Self {
        Self {
            partner_key: partner_key.filter(|k| !k.is_empty()),
            tolerance_secs: TIMESTAMP_TOLERANCE_SECS,
        }
    }

    /// Override the freshness window.
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Whether `timestamp` (unix seconds, as received) is within the
    /// tolerance window around `now`.
    pub fn is_fresh(&self, timestamp: &str, now: i64) -> bool {
        match timestamp.trim().parse::<i64>() {
            Ok(ts) => (now - ts).abs() <= self.tolerance_secs,
            Err(_) => false,
        }
    }

    /// Recompute the HMAC and compare it to `signature` in constant time.
    pub fn verify(
        &self,
        authorization: &str,
        url: &str,
        timestamp: &str,
        body: &[u8],
        signature: &str,
    ) -> bool {
        let Some(mut mac) = self.keyed_mac() else {
            return false;
        };
        let Ok(claimed) = hex::decode(signature.trim()) else {
            return false;
        };
        feed(&mut mac, authorization, url, timestamp, body);
        mac.verify_slice(&claimed).is_ok()
    }

    /// Run the freshness check followed by the signature check.
    pub fn check(
        &self,
        authorization: &str,
        url: &str,
        timestamp: &str,
        body: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        if !self.is_fresh(timestamp, now) {
            return Err(SignatureError::StaleTimestamp);
        }
        if !self.verify(authorization, url, timestamp, body, signature) {
            return Err(SignatureError::InvalidSignature);
        }
        Ok(())
    }

    /// Produce the lowercase hex signature the marketplace would send.
    ///
    /// Returns `None` when no partner key is configured.
    pub fn sign(&self, authorization: &str, url: &str, timestamp: &str, body: &[u8]) -> Option<String> {
        let mut mac = self.keyed_mac()?;
        feed(&mut mac, authorization, url, timestamp, body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn keyed_mac(&self) -> Option<HmacSha256> {
        let key = self.partner_key.as_deref()?;
        HmacSha256::new_from_slice(key.as_bytes()).ok()
    }
}

fn feed(mac: &mut HmacSha256, authorization: &str, url: &str, timestamp: &str, body: &[u8]) {
    mac.update(authorization.as_bytes());
    mac.update(url.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
}
