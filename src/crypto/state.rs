use base64::Engine as _;
use chrono::Utc;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::digest::OutputSizeUser;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::Duration;

use crate::error::RelayError;

type HmacSha256 = Hmac<Sha256>;

const MIN_KEY_LEN: usize = 32;

/// Helper to create an HMAC instance, resolving trait ambiguity.
fn new_hmac(key: &[u8]) -> Result<HmacSha256, RelayError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| RelayError::Crypto(format!("HMAC init failed: {e}")))
}

/// Issues and verifies HMAC-signed OAuth `state` values.
///
/// A state is `base64url(hmac || "nonce:issued_at")`; it is only accepted
/// back within `max_age` of issuance.
pub struct StateSigner {
    hmac_key: Vec<u8>,
    max_age: Duration,
}

impl StateSigner {
    /// Create a signer from a base64-encoded key (at least 32 bytes).
    pub fn new(secret_b64: &str, max_age: Duration) -> Result<Self, RelayError> {
        let hmac_key = base64::engine::general_purpose::STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| RelayError::Crypto(format!("Invalid STATE_SECRET base64: {e}")))?;

        if hmac_key.len() < MIN_KEY_LEN {
            return Err(RelayError::Crypto(format!(
                "STATE_SECRET must be at least {MIN_KEY_LEN} bytes, got {}",
                hmac_key.len()
            )));
        }

        Ok(Self { hmac_key, max_age })
    }

    /// Signer with a fresh random key; states do not survive a restart.
    pub fn random(max_age: Duration) -> Self {
        let mut hmac_key = vec![0u8; MIN_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut hmac_key);
        Self { hmac_key, max_age }
    }

    /// Issue a fresh state for an authorization redirect.
    pub fn issue(&self) -> Result<String, RelayError> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce = URL_SAFE_NO_PAD.encode(nonce);
        self.seal(&format!("{nonce}:{}", Utc::now().timestamp()))
    }

    /// Verify signature and age of a state returned on the callback.
    pub fn verify(&self, signed: &str) -> Result<(), RelayError> {
        let payload = self.open(signed)?;
        let issued_at: i64 = payload
            .rsplit_once(':')
            .and_then(|(_, ts)| ts.parse().ok())
            .ok_or(RelayError::InvalidState)?;

        let age = Utc::now().timestamp() - issued_at;
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        if age < 0 || age > max_age {
            return Err(RelayError::InvalidState);
        }
        Ok(())
    }

    /// `base64url(tag || payload)` where `tag` is HMAC-SHA256 over `payload`.
    pub fn seal(&self, payload: &str) -> Result<String, RelayError> {
        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload.as_bytes());
        let sealed: Vec<u8> = mac
            .finalize()
            .into_bytes()
            .iter()
            .chain(payload.as_bytes())
            .copied()
            .collect();
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Check the tag on a sealed state and return its payload.
    pub fn open(&self, sealed: &str) -> Result<String, RelayError> {
        let raw = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|_| RelayError::InvalidState)?;
        let tag_len = <HmacSha256 as OutputSizeUser>::output_size();
        if raw.len() < tag_len {
            return Err(RelayError::InvalidState);
        }
        let (tag, payload) = raw.split_at(tag_len);

        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| RelayError::InvalidState)?;

        String::from_utf8(payload.to_vec()).map_err(|_| RelayError::InvalidState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer(max_age: Duration) -> StateSigner {
        let key = base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]);
        StateSigner::new(&key, max_age).unwrap()
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let signer = test_signer(Duration::from_secs(600));
        let state = signer.issue().unwrap();
        assert!(signer.verify(&state).is_ok());
    }

    #[test]
    fn test_states_are_unique() {
        let signer = test_signer(Duration::from_secs(600));
        assert_ne!(signer.issue().unwrap(), signer.issue().unwrap());
    }

    #[test]
    fn test_tamper_detection() {
        let signer = test_signer(Duration::from_secs(600));
        let signed = signer.issue().unwrap();
        let tampered = format!("{}X", signed);
        assert!(matches!(signer.verify(&tampered), Err(RelayError::InvalidState)));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let ours = test_signer(Duration::from_secs(600));
        let theirs = StateSigner::random(Duration::from_secs(600));
        let signed = theirs.issue().unwrap();
        assert!(ours.verify(&signed).is_err());
    }

    #[test]
    fn test_expired_state_rejected() {
        let signer = test_signer(Duration::from_secs(600));
        let old = Utc::now().timestamp() - 601;
        let signed = signer.seal(&format!("nonce:{old}")).unwrap();
        assert!(matches!(signer.verify(&signed), Err(RelayError::InvalidState)));
    }

    #[test]
    fn test_truncated_state_rejected() {
        let signer = test_signer(Duration::from_secs(600));
        let short = URL_SAFE_NO_PAD.encode([0u8; 31]);
        assert!(matches!(signer.open(&short), Err(RelayError::InvalidState)));
        assert!(matches!(signer.open("!!not-base64!!"), Err(RelayError::InvalidState)));
    }

    #[test]
    fn test_short_secret_rejected() {
        let key = base64::engine::general_purpose::STANDARD.encode([0x01u8; 8]);
        assert!(matches!(
            StateSigner::new(&key, Duration::from_secs(60)),
            Err(RelayError::Crypto(_))
        ));
    }
}
