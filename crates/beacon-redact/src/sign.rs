//! HMAC-SHA256 signing of delivery bodies.
//!
//! The signature covers `timestamp + "." + body`, where `body` is the exact
//! byte sequence placed on the wire before compression. Collectors verify it by
//! recomputing the HMAC with the shared secret and comparing against the
//! `X-Signature` header (lowercase hex).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{RedactionError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signer holding a keyed HMAC state.
#[derive(Clone)]
pub struct PayloadSigner {
    mac: HmacSha256,
}

impl PayloadSigner {
    /// Create a signer from a shared secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(RedactionError::KeyError(
                "signing secret must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| RedactionError::KeyError(format!("invalid signing key: {}", e)))?;
        Ok(Self { mac })
    }

    /// Compute the hex signature of `timestamp.body`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, timestamp: i64, body: &[u8], signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadSigner { .. }")
    }
}
