//! Signed callback URLs.
//!
//! When a shared secret is configured, each callback URL handed to the webhook
//! carries a signature bound to its request id. The callback receiver only
//! accepts results whose signature matches, so a third party that merely
//! guesses request ids cannot inject results.
//!
//! The signature is `base64url(sha256(secret ":" request_id))` without padding.

use crate::record::RequestId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::fmt;

/// Query parameter carrying the signature on the callback URL.
pub const SIGNATURE_PARAM: &str = "signature";

/// Signs and verifies callback URLs with a shared secret.
#[derive(Clone)]
pub struct CallbackSigner {
    secret: String,
}

impl CallbackSigner {
    /// Create a signer from the shared secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signature for `request_id`.
    #[must_use]
    pub fn sign(&self, request_id: &RequestId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(request_id.as_str().as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Constant-time check of `signature` against `request_id`.
    #[must_use]
    pub fn verify(&self, request_id: &RequestId, signature: &str) -> bool {
        let expected = self.sign(request_id);
        constant_time_eq::constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

impl fmt::Debug for CallbackSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}
