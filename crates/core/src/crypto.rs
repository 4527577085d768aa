//! Credential sealing and capability tokens.
//!
//! - ChaCha20-Poly1305 AEAD sealing for the upstream API token at rest
//! - HMAC-SHA256 expiring capability tokens for write access
//!
//! Uses pure Rust crates; the sealing key is derived from the server secret
//! with SHA-256.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Prefix marking a sealed credential. A stored value without it is treated
/// as legacy plaintext and normalized on the next read.
pub const SEAL_PREFIX: &str = "enc:v1:";

const NONCE_LEN: usize = 12;

/// Capability token lifetime: 1 hour in seconds.
pub const CAPABILITY_EXPIRY_SECS: u64 = 3600;

/// Errors from the sealing / token layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    Rng(String),
    Seal(String),
    Unseal(String),
    InvalidToken(String),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rng(m) => write!(f, "RNG failure: {m}"),
            Self::Seal(m) => write!(f, "seal failure: {m}"),
            Self::Unseal(m) => write!(f, "unseal failure: {m}"),
            Self::InvalidToken(m) => write!(f, "invalid token: {m}"),
        }
    }
}

impl std::error::Error for CryptoError {}

// ── Credential sealing (ChaCha20-Poly1305) ──────────────────────────────────

fn derive_key(secret: &str) -> Key {
    let digest = Sha256::digest(secret.as_bytes());
    Key::clone_from_slice(digest.as_slice())
}

/// Seal a secret. Returns `enc:v1:<base64url(nonce || ciphertext)>`.
pub fn seal(secret_key: &str, plaintext: &str) -> Result<String, CryptoError> {
    let cipher = ChaCha20Poly1305::new(&derive_key(secret_key));

    let mut nonce = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::Rng(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| CryptoError::Seal(e.to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(format!("{SEAL_PREFIX}{}", URL_SAFE_NO_PAD.encode(envelope)))
}

/// Unseal a stored credential.
///
/// Legacy plaintext (no `enc:v1:` prefix) is returned as-is so the caller
/// can reseal it; a prefixed value that fails to decrypt is an error.
pub fn unseal(secret_key: &str, stored: &str) -> Result<String, CryptoError> {
    let Some(encoded) = stored.strip_prefix(SEAL_PREFIX) else {
        return Ok(stored.to_string());
    };

    let envelope = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| CryptoError::Unseal(format!("bad base64: {e}")))?;
    if envelope.len() <= NONCE_LEN {
        return Err(CryptoError::Unseal("envelope too short".into()));
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(&derive_key(secret_key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Unseal("decryption failed".into()))?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Unseal("not valid UTF-8".into()))
}

pub fn is_sealed(stored: &str) -> bool {
    stored.starts_with(SEAL_PREFIX)
}

/// Unseal and immediately reseal under a fresh nonce.
///
/// Normalizes legacy plaintext rows and old envelopes to the current
/// `enc:v1:` form, so every read leaves the stored value uniformly sealed.
pub fn reseal(secret_key: &str, stored: &str) -> Result<String, CryptoError> {
    let plaintext = unseal(secret_key, stored)?;
    seal(secret_key, &plaintext)
}

/// Generate a random hex-encoded secret. Used as a per-process fallback when
/// no secret key is configured; sealed values then survive only until restart.
pub fn random_secret() -> Result<String, CryptoError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(hex::encode(bytes))
}

// ── Capability tokens (HMAC-SHA256) ─────────────────────────────────────────

/// Issue a write-capability token: `<expiry_unix>.<base64url hmac>`.
pub fn issue_capability(secret_key: &str, now_unix: u64) -> String {
    let expires_at = now_unix + CAPABILITY_EXPIRY_SECS;
    let signature = hmac_sha256(secret_key.as_bytes(), expires_at.to_string().as_bytes());
    format!("{expires_at}.{}", URL_SAFE_NO_PAD.encode(signature))
}

/// Verify a capability token, returning its expiry time on success.
pub fn verify_capability(
    secret_key: &str,
    token: &str,
    now_unix: u64,
) -> Result<u64, CryptoError> {
    let (expiry_part, sig_part) = token
        .split_once('.')
        .ok_or_else(|| CryptoError::InvalidToken("malformed capability".into()))?;

    let expires_at: u64 = expiry_part
        .parse()
        .map_err(|_| CryptoError::InvalidToken("malformed expiry".into()))?;

    let expected = hmac_sha256(secret_key.as_bytes(), expiry_part.as_bytes());
    let actual = URL_SAFE_NO_PAD
        .decode(sig_part)
        .map_err(|_| CryptoError::InvalidToken("bad signature encoding".into()))?;

    if !constant_time_eq(&expected, &actual) {
        return Err(CryptoError::InvalidToken("bad signature".into()));
    }
    if now_unix > expires_at {
        return Err(CryptoError::InvalidToken("capability expired".into()));
    }

    Ok(expires_at)
}

/// Constant-time comparison of a configured password against user input.
pub fn verify_password(configured: &str, provided: &str) -> bool {
    // Compare HMACs of both inputs so length differences leak nothing.
    let key = b"gitmemo-password-verify";
    constant_time_eq(
        &hmac_sha256(key, configured.as_bytes()),
        &hmac_sha256(key, provided.as_bytes()),
    )
}

// ── Internal ────────────────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn seal_unseal_round_trip() {
        let sealed = seal(SECRET, "ghp_abc123").unwrap();
        assert!(is_sealed(&sealed));
        assert_eq!(unseal(SECRET, &sealed).unwrap(), "ghp_abc123");
    }

    #[test]
    fn sealing_twice_yields_distinct_ciphertexts() {
        let a = seal(SECRET, "token").unwrap();
        let b = seal(SECRET, "token").unwrap();
        assert_ne!(a, b);
        assert_eq!(unseal(SECRET, &a).unwrap(), unseal(SECRET, &b).unwrap());
    }

    #[test]
    fn legacy_plaintext_passes_through_and_reseals() {
        assert_eq!(unseal(SECRET, "plain-token").unwrap(), "plain-token");

        let normalized = reseal(SECRET, "plain-token").unwrap();
        assert!(is_sealed(&normalized));
        assert_eq!(unseal(SECRET, &normalized).unwrap(), "plain-token");
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let sealed = seal(SECRET, "ghp_abc123").unwrap();
        let mut tampered = sealed.clone();
        tampered.pop();
        tampered.push('A');
        assert!(unseal(SECRET, &tampered).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let sealed = seal(SECRET, "ghp_abc123").unwrap();
        assert!(unseal("other-secret", &sealed).is_err());
    }

    #[test]
    fn capability_round_trip() {
        let token = issue_capability(SECRET, 1_000_000);
        let expires_at = verify_capability(SECRET, &token, 1_000_100).unwrap();
        assert_eq!(expires_at, 1_000_000 + CAPABILITY_EXPIRY_SECS);
    }

    #[test]
    fn expired_capability_is_rejected() {
        let token = issue_capability(SECRET, 1_000_000);
        let err = verify_capability(SECRET, &token, 1_000_000 + CAPABILITY_EXPIRY_SECS + 1);
        assert!(err.is_err());
    }

    #[test]
    fn forged_capability_is_rejected() {
        let token = issue_capability("other-secret", 1_000_000);
        assert!(verify_capability(SECRET, &token, 1_000_100).is_err());
    }

    #[test]
    fn password_verify_is_exact() {
        assert!(verify_password("hunter2", "hunter2"));
        assert!(!verify_password("hunter2", "hunter3"));
        assert!(!verify_password("hunter2", "hunter2 "));
    }
}
