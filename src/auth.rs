//! Admin password check and session tokens.
//!
//! The configured password is hashed with Argon2id once at startup and every
//! login is verified against that hash. Sessions are HS256 JWTs signed with a
//! per-process key; the live session ids are also kept in memory so a logout
//! revokes a token before its `exp`.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("incorrect password")]
    InvalidPassword,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("failed to issue session token: {0}")]
    Token(String),
}

/// Admin session capability. Held by the application state and consulted by
/// the router before any admin method runs.
pub trait SessionGate {
    /// Returns a fresh session token when `password` matches the admin secret.
    fn login(&mut self, password: &str) -> Result<String, AuthError>;
    fn is_authenticated(&self, token: &str) -> bool;
    /// Returns whether a live session was dropped.
    fn logout(&mut self, token: &str) -> bool;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sid: String,
    iat: i64,
    exp: i64,
}

pub struct PasswordGate {
    /// PHC string, salt and parameters included.
    password_hash: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: TimeDelta,
    sessions: HashMap<String, DateTime<Utc>>,
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

impl PasswordGate {
    pub fn new(secret: &str, ttl: TimeDelta) -> Result<Self, AuthError> {
        let password_hash = hash_password(secret)?;

        // Restarting the sidecar invalidates every token.
        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(Uuid::new_v4().as_bytes());
        key.extend_from_slice(Uuid::new_v4().as_bytes());

        Ok(Self {
            password_hash,
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            validation: Validation::new(Algorithm::HS256),
            ttl,
            sessions: HashMap::new(),
        })
    }

    fn verify_password(&self, password: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(&self.password_hash)
            .map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Session id of a token with a valid signature and unexpired `exp`.
    fn session_id(&self, token: &str) -> Option<String> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims.sid)
    }

    fn login_at(&mut self, password: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        if !self.verify_password(password)? {
            return Err(AuthError::InvalidPassword);
        }
        self.sessions.retain(|_, expires| *expires > now);

        let sid = Uuid::new_v4().simple().to_string();
        let expires = now + self.ttl;
        let claims = SessionClaims {
            sid: sid.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Token(e.to_string()))?;
        self.sessions.insert(sid, expires);
        Ok(token)
    }

    fn is_authenticated_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.session_id(token)
            .and_then(|sid| self.sessions.get(&sid))
            .map(|expires| *expires > now)
            .unwrap_or(false)
    }
}

impl SessionGate for PasswordGate {
    fn login(&mut self, password: &str) -> Result<String, AuthError> {
        self.login_at(password, Utc::now())
    }

    fn is_authenticated(&self, token: &str) -> bool {
        self.is_authenticated_at(token, Utc::now())
    }

    fn logout(&mut self, token: &str) -> bool {
        let Some(sid) = self.session_id(token) else {
            return false;
        };
        self.sessions.remove(&sid).is_some()
    }
}
