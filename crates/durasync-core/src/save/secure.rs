//! Integrity hashing and encryption policy for save payloads.
//!
//! The secure serializer wraps another serializer. When protection is on it
//! writes an envelope:
//!
//! ```text
//! { "version": 1, "is_encrypted": bool, "payload": "...", "hash": "..." }
//! ```
//!
//! `hash` is base64(SHA-256(secret_key + "|" + plaintext)). The cipher is
//! supplied by the host through [`PayloadCipher`]; none ships here.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use durasync_types::models::SaveSecurityConfig;
use durasync_types::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::serializer::SaveSerializer;
use crate::error::CoreResult;

const ENVELOPE_VERSION: u32 = 1;

/// Reversible transform applied to serialized text when encryption is enabled.
pub trait PayloadCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str, secret_key: &str) -> CoreResult<String>;
    fn decrypt(&self, ciphertext: &str, secret_key: &str) -> Result<String, String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SecureEnvelope {
    version: u32,
    is_encrypted: bool,
    payload: String,
    hash: String,
}

pub struct SecureSaveSerializer {
    inner: Arc<dyn SaveSerializer>,
    config: SaveSecurityConfig,
    cipher: Option<Arc<dyn PayloadCipher>>,
}

impl SecureSaveSerializer {
    /// Fails when encryption is enabled but no cipher was supplied.
    pub fn new(
        inner: Arc<dyn SaveSerializer>,
        config: SaveSecurityConfig,
        cipher: Option<Arc<dyn PayloadCipher>>,
    ) -> Result<Self, ConfigError> {
        if config.enable_encryption && cipher.is_none() {
            return Err(ConfigError::MissingCollaborator { name: "payload cipher".to_string() });
        }
        Ok(Self { inner, config, cipher })
    }

    fn compute_hash(&self, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.config.secret_key.as_bytes());
        hasher.update(b"|");
        hasher.update(plaintext.as_bytes());
        BASE64.encode(hasher.finalize())
    }

    fn hash_matches(&self, plaintext: &str, hash: &str) -> bool {
        if hash.trim().is_empty() {
            return true;
        }
        let expected = self.compute_hash(plaintext);
        expected.as_bytes().ct_eq(hash.as_bytes()).into()
    }

    fn parse_envelope(raw: &str) -> Option<SecureEnvelope> {
        let envelope: SecureEnvelope = serde_json::from_str(raw).ok()?;
        if envelope.version < 1 || envelope.payload.is_empty() {
            return None;
        }
        Some(envelope)
    }
}

impl SaveSerializer for SecureSaveSerializer {
    fn serialize(&self, value: &Value) -> CoreResult<String> {
        let plaintext = self.inner.serialize(value)?;
        if !self.config.protection_enabled() {
            return Ok(plaintext);
        }

        let payload = match (&self.cipher, self.config.enable_encryption) {
            (Some(cipher), true) => cipher.encrypt(&plaintext, &self.config.secret_key)?,
            _ => plaintext.clone(),
        };
        let hash = if self.config.enable_integrity_hash {
            self.compute_hash(&plaintext)
        } else {
            String::new()
        };

        let envelope = SecureEnvelope {
            version: ENVELOPE_VERSION,
            is_encrypted: self.config.enable_encryption,
            payload,
            hash,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    fn try_deserialize(&self, text: &str) -> Result<Value, String> {
        if text.trim().is_empty() {
            return Err("Payload is empty".to_string());
        }

        let Some(envelope) = Self::parse_envelope(text) else {
            if self.config.allow_legacy_plaintext {
                return self.inner.try_deserialize(text);
            }
            return Err("Payload is not a secure envelope".to_string());
        };

        let plaintext = if envelope.is_encrypted {
            let cipher = self
                .cipher
                .as_ref()
                .ok_or_else(|| "Encrypted payload but no cipher configured".to_string())?;
            cipher.decrypt(&envelope.payload, &self.config.secret_key)?
        } else {
            envelope.payload
        };

        if !self.hash_matches(&plaintext, &envelope.hash) {
            return Err("Integrity hash mismatch".to_string());
        }

        self.inner.try_deserialize(&plaintext)
    }
}
