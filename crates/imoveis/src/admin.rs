//! Admin panel access: one configured account, argon2-hashed password, and
//! opaque bearer tokens kept in memory until they expire or are revoked.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AdminConfig;

/// The single admin account allowed to edit the catalog.
#[derive(Clone)]
pub struct AdminCredentials {
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl AdminCredentials {
    pub fn new(email: impl Into<String>, password: &str) -> Result<Self, AuthError> {
        Ok(Self {
            email: email.into(),
            password_hash: hash_password(password)?,
        })
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                warn!(error = %err, "configured admin password hash is malformed");
                false
            }
        }
    }

    fn matches_email(&self, email: &str) -> bool {
        self.email.trim().to_lowercase() == email.trim().to_lowercase()
    }

    /// Runs the password hash even for an unknown e-mail so that response
    /// time does not reveal the admin address.
    fn accepts(&self, email: &str, password: &str) -> bool {
        let password_ok = self.verify_password(password);
        let email_ok = self.matches_email(email);
        password_ok & email_ok
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|err| AuthError::Hash(err.to_string()))?;
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

/// Token handed to the admin panel after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    pub token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("admin login is not configured")]
    Disabled,
    #[error("credenciais inválidas")]
    InvalidCredentials,
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid session token")]
    Unauthorized,
    #[error("session expired")]
    Expired,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("session store unavailable")]
    Unavailable,
}

/// Issues and checks admin session tokens.
pub struct AdminAuthenticator {
    credentials: Option<AdminCredentials>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl AdminAuthenticator {
    pub fn new(credentials: Option<AdminCredentials>, ttl: Duration) -> Self {
        Self {
            credentials,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.credentials.clone(), config.session_ttl)
    }

    /// Every login fails with [`AuthError::Disabled`].
    pub fn disabled() -> Self {
        Self::new(None, Duration::zero())
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AdminSession, AuthError> {
        self.login_at(email, password, Utc::now())
    }

    pub fn authorize(&self, token: &str) -> Result<(), AuthError> {
        self.authorize_at(token, Utc::now())
    }

    /// Returns whether the token was live.
    pub fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let removed = self.sessions()?.remove(token).is_some();
        if removed {
            info!("admin session revoked");
        }
        Ok(removed)
    }

    fn login_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminSession, AuthError> {
        let credentials = self.credentials.as_ref().ok_or(AuthError::Disabled)?;
        if !credentials.accepts(email, password) {
            warn!(email = %email.trim(), "admin login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let session = AdminSession {
            token: Uuid::new_v4().to_string(),
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions()?;
        sessions.retain(|_, expires_at| *expires_at > now);
        sessions.insert(session.token.clone(), session.expires_at);
        info!(expires_at = %session.expires_at, "admin session issued");
        Ok(session)
    }

    fn authorize_at(&self, token: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut sessions = self.sessions()?;
        match sessions.get(token).copied() {
            None => Err(AuthError::Unauthorized),
            Some(expires_at) if expires_at <= now => {
                sessions.remove(token);
                Err(AuthError::Expired)
            }
            Some(_) => Ok(()),
        }
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, DateTime<Utc>>>, AuthError> {
        self.sessions.lock().map_err(|_| AuthError::Unavailable)
    }
}

/// `Authorization: Bearer <token>`; a blank token counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
