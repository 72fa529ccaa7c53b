//! Confirmation tokens for state-changing tools
//!
//! A token is `"{expires_unix}.{hex hmac}"` where the MAC covers the user, the
//! canonical tool call and the expiry. Nothing is stored server-side: a token
//! proves that this exact call was proposed to this user and has not expired.
//! The leading 16 bytes of the MAC double as the ledger transfer id, so one
//! token can move money at most once.

use super::ToolCall;
use crate::error::BankingError;
use crate::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::Write;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub struct ConfirmationGate {
    secret: Vec<u8>,
    ttl: Duration,
    require_token: bool,
}

impl ConfirmationGate {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: std::time::Duration, require_token: bool) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(5)),
            require_token,
        }
    }

    /// Token for `call` proposed to `user_id`, valid until the returned instant.
    pub fn issue(&self, user_id: Uuid, call: &ToolCall) -> Result<(String, DateTime<Utc>)> {
        self.issue_at(user_id, call, Utc::now())
    }

    fn issue_at(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let expires = (now + self.ttl).timestamp();
        let tag = self.sign(user_id, call, expires)?;
        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or_else(|| BankingError::Confirmation("invalid expiry".to_string()))?;

        Ok((format!("{}.{}", expires, hex::encode(tag)), expires_at))
    }

    /// Check a confirmation for `call` and return the idempotency key the
    /// token carries.
    ///
    /// A missing token passes with no key unless tokens are required. A
    /// supplied token is always checked.
    pub fn verify(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        token: Option<&str>,
    ) -> Result<Option<u128>> {
        self.verify_at(user_id, call, token, Utc::now())
    }

    fn verify_at(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<u128>> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            if self.require_token {
                return Err(BankingError::Confirmation(
                    "a confirmation token is required".to_string(),
                ));
            }
            return Ok(None);
        };

        let malformed = || BankingError::Confirmation("malformed confirmation token".to_string());
        let (expires, tag) = token.split_once('.').ok_or_else(malformed)?;
        let expires: i64 = expires.parse().map_err(|_| malformed())?;
        let tag = hex::decode(tag).map_err(|_| malformed())?;

        if now.timestamp() > expires {
            return Err(BankingError::Confirmation(
                "confirmation has expired, please request the operation again".to_string(),
            ));
        }

        let mac = self.mac(user_id, call, expires)?;
        mac.verify_slice(&tag).map_err(|_| {
            BankingError::Confirmation(
                "confirmation does not match the proposed operation".to_string(),
            )
        })?;

        Ok(idempotency_key(&tag))
    }

    fn mac(&self, user_id: Uuid, call: &ToolCall, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| BankingError::Config(format!("invalid confirmation secret: {}", e)))?;

        mac.update(user_id.as_bytes());
        mac.update(b"|");
        serde_json::to_writer(MacWriter(&mut mac), call)?;
        mac.update(b"|");
        mac.update(expires.to_string().as_bytes());

        Ok(mac)
    }

    fn sign(&self, user_id: Uuid, call: &ToolCall, expires: i64) -> Result<Vec<u8>> {
        Ok(self
            .mac(user_id, call, expires)?
            .finalize()
            .into_bytes()
            .to_vec())
    }
}

/// Ledger transfer id taken from a verified MAC tag. Zero is not a valid id.
fn idempotency_key(tag: &[u8]) -> Option<u128> {
    let head: [u8; 16] = tag.get(..16)?.try_into().ok()?;
    Some(u128::from_be_bytes(head)).filter(|key| *key != 0)
}

/// Streams serialized JSON straight into the MAC.
struct MacWriter<'a, M: Mac>(&'a mut M);

impl<'a, M: Mac> Write for MacWriter<'a, M> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
