//! Session state held entirely in the client's cookie.
//!
//! This module provides the [`Session`] payload minted after a successful
//! authorization-code exchange, the [`CookiePolicy`] describing how the session
//! cookie is written, and the [`CookieCodec`] that turns one into the other.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tower_cookies::cookie::SameSite;
use tracing::debug;

const ENCRYPTED_PREFIX: &str = "v1.";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// The token set returned by the identity provider, as stored in the cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token_type: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_expires_in"
    )]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Some providers send `expires_in` as a string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(seconds)) => Ok(Some(seconds)),
        Some(Seconds::Text(seconds)) => seconds
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Session {
    /// Lifetime advertised by the provider, if any.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in.map(Duration::from_secs)
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token_type", &self.token_type)
            .field("access_token", &"[redacted]")
            .field("id_token", &self.id_token.as_ref().map(|_| "[redacted]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// How the session cookie is written.
#[derive(Clone)]
pub struct CookiePolicy {
    /// The name of the session cookie
    pub name: String,
    /// The path for the session cookie
    pub path: Option<String>,
    /// The domain for the session cookie
    pub domain: Option<String>,
    pub http_only: bool,
    /// Whether the session cookie should be secure
    pub secure: bool,
    /// The same-site policy for the session cookie
    pub same_site: Option<SameSite>,
    /// Symmetric secret used to encrypt the cookie payload
    pub secret: Option<String>,
    /// Fixed cookie lifetime; when unset the token's `expires_in` is used
    pub expires: Option<Duration>,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: "auth".to_string(),
            path: Some("/".to_string()),
            domain: None,
            http_only: true,
            secure: true,
            same_site: Some(SameSite::Lax),
            secret: None,
            expires: None,
        }
    }
}

impl Debug for CookiePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookiePolicy")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("http_only", &self.http_only)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .field("expires", &self.expires)
            .finish()
    }
}

/// Errors raised while encoding or decoding a cookie value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cookie payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cookie value is not valid base64")]
    Encoding,
    #[error("cookie payload could not be decrypted")]
    Crypto,
}

/// Serializes cookie payloads, encrypting them with AES-256-GCM when a secret
/// is configured and base64-encoding them otherwise.
#[derive(Clone)]
pub struct CookieCodec {
    cipher: Option<Aes256Gcm>,
}

impl CookieCodec {
    pub fn new(secret: Option<&str>) -> Self {
        let cipher = secret.map(|secret| {
            let key = Sha256::digest(secret.as_bytes());
            Aes256Gcm::new(&key)
        });
        Self { cipher }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let payload = serde_json::to_vec(value)?;

        let Some(cipher) = &self.cipher else {
            return Ok(URL_SAFE_NO_PAD.encode(payload));
        };

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload.as_ref())
            .map_err(|_| CodecError::Crypto)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", URL_SAFE_NO_PAD.encode(out)))
    }

    pub fn decode<T: DeserializeOwned>(&self, value: &str) -> Result<T, CodecError> {
        let Some(cipher) = &self.cipher else {
            // Cookies written by other encoders may still carry standard padding.
            let raw = URL_SAFE_NO_PAD
                .decode(value)
                .or_else(|_| STANDARD.decode(value))
                .map_err(|_| CodecError::Encoding)?;
            return Ok(serde_json::from_slice(&raw)?);
        };

        let encoded = value
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or(CodecError::Crypto)?;
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| CodecError::Encoding)?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Crypto);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Crypto)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Decodes a session cookie, treating every failure as "no session".
    pub fn decode_session(&self, value: &str) -> Option<Session> {
        match self.decode::<Session>(value) {
            Ok(session) => Some(session),
            Err(err) => {
                debug!(error = %err, encrypted = self.is_encrypted(), "discarding unreadable session cookie");
                None
            }
        }
    }
}

impl Debug for CookieCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec")
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}
