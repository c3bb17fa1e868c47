//! Anti-forgery tokens for state-changing form submissions.
//!
//! A token binds a user to an issue time and a random nonce, signed with a
//! server secret. Each token is accepted once within its lifetime; replays
//! are rejected.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

use stockledger_core::UserId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormTokenError {
    #[error("missing form token")]
    Missing,

    #[error("malformed form token")]
    Malformed,

    #[error("form token signature mismatch")]
    BadSignature,

    #[error("form token issued to another user")]
    WrongUser,

    #[error("form token expired")]
    Expired,

    #[error("form token already used")]
    Replayed,

    #[error("form token key rejected")]
    InvalidKey,
}

/// Issues and consumes single-use form tokens.
pub struct FormTokens {
    secret: Vec<u8>,
    ttl: Duration,
    used: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl core::fmt::Debug for FormTokens {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FormTokens").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl FormTokens {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            used: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh token for `user`.
    pub fn issue(&self, user: UserId, now: DateTime<Utc>) -> Result<String, FormTokenError> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let payload = format!("{}|{}|{}", user, now.timestamp(), URL_SAFE_NO_PAD.encode(nonce));
        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check a submitted token and mark it as used.
    pub fn consume(&self, token: Option<&str>, user: UserId, now: DateTime<Utc>) -> Result<(), FormTokenError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(FormTokenError::Missing)?;

        let (payload_b64, sig_b64) = token.split_once('.').ok_or(FormTokenError::Malformed)?;
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| FormTokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| FormTokenError::Malformed)?;
        let payload = String::from_utf8(payload_bytes).map_err(|_| FormTokenError::Malformed)?;

        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_| FormTokenError::BadSignature)?;

        let mut parts = payload.split('|');
        let (Some(token_user), Some(issued), Some(_nonce), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(FormTokenError::Malformed);
        };

        if token_user != user.to_string() {
            return Err(FormTokenError::WrongUser);
        }

        let issued: i64 = issued.parse().map_err(|_| FormTokenError::Malformed)?;
        let issued_at = Utc
            .timestamp_opt(issued, 0)
            .single()
            .ok_or(FormTokenError::Malformed)?;
        let expires_at = issued_at + self.ttl;
        if now >= expires_at {
            return Err(FormTokenError::Expired);
        }

        let mut used = self.used.lock().map_err(|_| FormTokenError::Malformed)?;
        used.retain(|_, exp| *exp > now);
        if used.contains_key(token) {
            return Err(FormTokenError::Replayed);
        }
        used.insert(token.to_string(), expires_at);
        Ok(())
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, FormTokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| FormTokenError::InvalidKey)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
