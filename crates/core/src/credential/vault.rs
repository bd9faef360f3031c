//! Credential blob encoding.
//!
//! Blobs are stored as text in one of these shapes:
//! - `enc:<base64(nonce || ciphertext)>`: AES-256-GCM, key = SHA-256(app secret)
//! - `plain:<base64(json)>`: written when no app secret is configured
//! - `{...}`: bare JSON object from older installs
//! - anything else: a raw token, accepted only by providers that opt in

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix of encrypted blobs.
pub const ENCRYPTED_PREFIX: &str = "enc:";
/// Prefix of base64-only blobs written without an app secret.
pub const PLAIN_PREFIX: &str = "plain:";

/// AES-256-GCM nonce size (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;

/// Key under which a raw legacy token is exposed.
pub const TOKEN_FIELD: &str = "token";

/// Errors that can occur while encoding or decoding credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid base64 payload: {0}")]
    Decode(String),

    #[error("failed to decrypt credential: {0}")]
    Decrypt(String),

    #[error("failed to encrypt credential: {0}")]
    Encrypt(String),

    #[error("app secret is empty")]
    MissingSecret,

    #[error("unsupported credential format")]
    InvalidFormat,

    #[error("credential has no non-empty fields")]
    Empty,
}

/// Decrypted provider credential: a flat map of string fields.
///
/// `Debug` prints field names only so credentials can be logged safely.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    fields: HashMap<String, String>,
}

impl Credential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter (useful for tests and seeding).
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    /// Trimmed value of a field, or `None` when missing or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl From<HashMap<String, String>> for Credential {
    fn from(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("fields", &self.keys())
            .finish()
    }
}

/// Encode `plaintext` for storage.
///
/// With a blank secret the payload is only base64-encoded (`plain:`), which
/// keeps first boot working but is not encryption.
pub fn encrypt(plaintext: &[u8], secret: &str) -> Result<String, CredentialError> {
    if secret.trim().is_empty() {
        return Ok(format!("{}{}", PLAIN_PREFIX, BASE64.encode(plaintext)));
    }

    let cipher = cipher_for(secret)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CredentialError::Encrypt(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(sealed)))
}

/// Decrypt the base64 body of an `enc:` blob (prefix already removed).
pub fn decrypt(payload: &str, secret: &str) -> Result<Vec<u8>, CredentialError> {
    if secret.trim().is_empty() {
        return Err(CredentialError::MissingSecret);
    }

    let raw = BASE64
        .decode(payload.trim())
        .map_err(|e| CredentialError::Decode(e.to_string()))?;
    if raw.len() < NONCE_SIZE {
        return Err(CredentialError::Decrypt("ciphertext too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
    let cipher = cipher_for(secret)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| CredentialError::Decrypt(e.to_string()))
}

/// Decode a stored blob into a credential.
///
/// A blank blob yields an empty credential (provider not configured).
/// `raw_token_fallback` lets providers whose credential is a single token
/// accept blobs that are not JSON; the text is exposed as the `token` field.
pub fn parse_credential(
    blob: &str,
    secret: &str,
    raw_token_fallback: bool,
) -> Result<Credential, CredentialError> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return Ok(Credential::new());
    }

    if let Some(body) = trimmed.strip_prefix(PLAIN_PREFIX) {
        let payload = BASE64
            .decode(body)
            .map_err(|e| CredentialError::Decode(e.to_string()))?;
        if let Some(credential) = parse_json(&payload) {
            return Ok(credential);
        }
        if raw_token_fallback {
            let token = String::from_utf8_lossy(&payload).into_owned();
            return Ok(Credential::new().with(TOKEN_FIELD, &token));
        }
        return Err(CredentialError::InvalidFormat);
    }

    if let Some(body) = trimmed.strip_prefix(ENCRYPTED_PREFIX) {
        let payload = decrypt(body, secret)?;
        return parse_json(&payload).ok_or(CredentialError::InvalidFormat);
    }

    if trimmed.starts_with('{') {
        if let Some(credential) = parse_json(trimmed.as_bytes()) {
            return Ok(credential);
        }
    }

    if raw_token_fallback {
        return Ok(Credential::new().with(TOKEN_FIELD, trimmed));
    }

    Err(CredentialError::InvalidFormat)
}

/// Normalize operator-supplied fields and encode them for storage.
///
/// Keys and values are trimmed and blank values dropped; at least one field
/// must remain.
pub fn seal_fields(
    fields: &HashMap<String, String>,
    secret: &str,
) -> Result<String, CredentialError> {
    let cleaned: BTreeMap<&str, &str> = fields
        .iter()
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Err(CredentialError::Empty);
    }

    let json =
        serde_json::to_vec(&cleaned).map_err(|e| CredentialError::Encrypt(e.to_string()))?;
    encrypt(&json, secret)
}

/// Parse a non-empty JSON object of strings.
fn parse_json(raw: &[u8]) -> Option<Credential> {
    serde_json::from_slice::<HashMap<String, String>>(raw)
        .ok()
        .filter(|map| !map.is_empty())
        .map(Credential::from)
}

fn cipher_for(secret: &str) -> Result<Aes256Gcm, CredentialError> {
    let key = Sha256::digest(secret.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|e| CredentialError::Encrypt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_roundtrip_without_secret() {
        let plaintext = br#"{"token":"abc"}"#;
        let blob = encrypt(plaintext, "").unwrap();
        assert!(blob.starts_with(PLAIN_PREFIX));

        let body = blob.strip_prefix(PLAIN_PREFIX).unwrap();
        assert_eq!(BASE64.decode(body).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let blob = encrypt(b"hello", "s3cret").unwrap();
        assert!(blob.starts_with(ENCRYPTED_PREFIX));

        let body = blob.strip_prefix(ENCRYPTED_PREFIX).unwrap();
        assert_eq!(decrypt(body, "s3cret").unwrap(), b"hello");
    }

    #[test]
    fn test_encryption_uses_fresh_nonce() {
        let a = encrypt(b"same", "key").unwrap();
        let b = encrypt(b"same", "key").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_with_wrong_secret_fails() {
        let blob = encrypt(b"hello", "right").unwrap();
        let body = blob.strip_prefix(ENCRYPTED_PREFIX).unwrap();
        assert!(matches!(
            decrypt(body, "wrong"),
            Err(CredentialError::Decrypt(_))
        ));
    }

    #[test]
    fn test_decrypt_requires_secret() {
        assert!(matches!(
            decrypt("AAAA", "  "),
            Err(CredentialError::MissingSecret)
        ));
    }

    #[test]
    fn test_decrypt_short_payload() {
        let short = BASE64.encode([1u8; 4]);
        assert!(matches!(
            decrypt(&short, "key"),
            Err(CredentialError::Decrypt(_))
        ));
    }

    #[test]
    fn test_parse_blank_blob_is_empty() {
        let credential = parse_credential("   ", "key", false).unwrap();
        assert!(credential.is_empty());
    }

    #[test]
    fn test_parse_encrypted_json() {
        let blob = seal_fields(&fields(&[("api_key", " k1 "), ("username", "")]), "key").unwrap();
        let credential = parse_credential(&blob, "key", false).unwrap();
        assert_eq!(credential.get("api_key"), Some("k1"));
        assert_eq!(credential.get("username"), None);
        assert_eq!(credential.keys(), vec!["api_key"]);
    }

    #[test]
    fn test_parse_plain_json() {
        let blob = seal_fields(&fields(&[("token", "t")]), "").unwrap();
        let credential = parse_credential(&blob, "", false).unwrap();
        assert_eq!(credential.get("token"), Some("t"));
    }

    #[test]
    fn test_parse_plain_raw_token_only_with_fallback() {
        let blob = format!("{}{}", PLAIN_PREFIX, BASE64.encode("rawtoken"));

        let credential = parse_credential(&blob, "", true).unwrap();
        assert_eq!(credential.get(TOKEN_FIELD), Some("rawtoken"));

        assert!(matches!(
            parse_credential(&blob, "", false),
            Err(CredentialError::InvalidFormat)
        ));
    }

    #[test]
    fn test_parse_bare_json() {
        let credential = parse_credential(r#"{"api_key":"x"}"#, "", false).unwrap();
        assert_eq!(credential.get("api_key"), Some("x"));
    }

    #[test]
    fn test_parse_legacy_token() {
        let credential = parse_credential("  legacy-token  ", "", true).unwrap();
        assert_eq!(credential.get(TOKEN_FIELD), Some("legacy-token"));

        assert!(matches!(
            parse_credential("legacy-token", "", false),
            Err(CredentialError::InvalidFormat)
        ));
    }

    #[test]
    fn test_parse_empty_json_object_is_rejected() {
        assert!(parse_credential("{}", "", false).is_err());
    }

    #[test]
    fn test_parse_encrypted_without_secret_fails() {
        let blob = seal_fields(&fields(&[("token", "t")]), "key").unwrap();
        assert!(matches!(
            parse_credential(&blob, "", true),
            Err(CredentialError::MissingSecret)
        ));
    }

    #[test]
    fn test_seal_rejects_all_blank_fields() {
        let result = seal_fields(&fields(&[("token", "  "), ("", "x")]), "key");
        assert!(matches!(result, Err(CredentialError::Empty)));
    }

    #[test]
    fn test_debug_hides_values() {
        let credential = Credential::new().with("api_key", "super-secret");
        let printed = format!("{:?}", credential);
        assert!(printed.contains("api_key"));
        assert!(!printed.contains("super-secret"));
    }
}
