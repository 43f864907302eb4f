use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::event::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between the delivery timestamp and local time.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid signing secret: {0}")]
    InvalidSecret(String),
    #[error("Invalid timestamp header: {0}")]
    InvalidTimestamp(String),
    #[error("Timestamp outside of tolerance window")]
    StaleTimestamp,
    #[error("No matching signature")]
    NoMatchingSignature,
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Verifies signed webhook deliveries from the identity provider.
///
/// The provider signs `{id}.{timestamp}.{body}` with HMAC-SHA256 using a
/// shared `whsec_`-prefixed base64 secret, and sends the signature as one
/// or more space-separated `v1,<base64>` entries.
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    /// Decode the shared signing secret. An unusable secret is a startup
    /// error, not a per-request one.
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;

        if key.is_empty() {
            return Err(SignatureError::InvalidSecret("empty key".to_string()));
        }

        Ok(Self { key })
    }

    /// Verify a delivery and parse its body into the event envelope.
    pub fn verify(
        &self,
        body: &[u8],
        id: &str,
        timestamp: &str,
        signature_header: &str,
    ) -> Result<WebhookEvent, SignatureError> {
        self.check_timestamp(timestamp)?;

        let mut matched = false;
        for entry in signature_header.split_whitespace() {
            let encoded = match entry.strip_prefix("v1,") {
                Some(encoded) => encoded,
                None => continue,
            };
            let candidate = match BASE64.decode(encoded) {
                Ok(candidate) => candidate,
                Err(_) => continue,
            };
            if self.mac(id, timestamp, body).verify_slice(&candidate).is_ok() {
                matched = true;
                break;
            }
        }

        if !matched {
            return Err(SignatureError::NoMatchingSignature);
        }

        serde_json::from_slice(body).map_err(|e| SignatureError::InvalidPayload(e.to_string()))
    }

    fn check_timestamp(&self, timestamp: &str) -> Result<(), SignatureError> {
        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;

        if (Utc::now().timestamp() - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(SignatureError::StaleTimestamp);
        }

        Ok(())
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }
}
