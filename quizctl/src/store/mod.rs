//! Interfaces to the external identity collaborators.
//!
//! Users, sessions and API keys are owned by the identity layer (OIDC login, session issuance,
//! key storage). The authorization core only asks two questions of it:
//!
//! - [`ApiKeyStore`]: is this API key valid, and what permissions does it carry? Keys are also
//!   created and deleted through this store.
//! - [`SessionStore`]: is there a live session for these request headers?
//!
//! Two adapters are provided: [`in_memory::InMemoryStore`] for tests and local development, and
//! [`postgres::PostgresStore`] for deployments sharing the identity layer's database.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, header};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::types::{ApiKeyId, UserId};

pub mod in_memory;
pub mod postgres;

/// Failure talking to an external store. Distinct from "credential is invalid".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Identity record as provided by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub preferred_username: Option<String>,
    /// JSON-serialized array of group names from the OIDC `groups` claim
    pub groups: Option<String>,
}

/// Where a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Issued at login and carried by the session cookie
    Cookie,
    /// Minted implicitly by the key store for a request bearing a valid API key
    ApiKey,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    /// `None` for implicit sessions of keys that never expire
    pub expires_at: Option<DateTime<Utc>>,
    pub origin: SessionOrigin,
}

/// An API key as held by the key store. The secret itself is never stored.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub name: String,
    pub user_id: UserId,
    /// Raw JSON text, in either the scope-list or resource-map encoding
    pub permissions: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Revoked keys are disabled rather than deleted
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Why a presented key was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRejection {
    Unknown,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyVerification {
    Valid(ApiKeyRecord),
    Rejected(KeyRejection),
}

impl ApiKeyRecord {
    /// Classify this record for a verification performed at `now`.
    pub fn verify_at(self, now: DateTime<Utc>) -> KeyVerification {
        if !self.enabled {
            KeyVerification::Rejected(KeyRejection::Revoked)
        } else if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            KeyVerification::Rejected(KeyRejection::Expired)
        } else {
            KeyVerification::Valid(self)
        }
    }
}

/// Absolute expiry for a key living `expires_in` from `now`.
pub(crate) fn expiry_from(now: DateTime<Utc>, expires_in: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
    let Some(expires_in) = expires_in else {
        return Ok(None);
    };
    chrono::Duration::from_std(expires_in)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .map(Some)
        .ok_or_else(|| StoreError::Unavailable(format!("key expiry {expires_in:?} is out of range")))
}

/// A validated key creation, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: UserId,
    pub name: String,
    pub expires_in: Option<Duration>,
    /// Resource-map encoding, already checked against the scope catalog
    pub permissions: BTreeMap<String, Vec<String>>,
}

/// Result of a key creation. `secret` is only ever available here.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub record: ApiKeyRecord,
    pub secret: String,
}

/// The external key store.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Check a presented secret: it must exist, be enabled and not be expired.
    async fn verify_key(&self, secret: &str) -> Result<KeyVerification>;

    async fn create_key(&self, request: NewApiKey) -> Result<CreatedApiKey>;

    /// Remove a key. Returns `false` when no key has this id.
    async fn delete_key(&self, key_id: &str) -> Result<bool>;

    async fn list_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>>;
}

/// The external session layer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up the live session for a request, if any.
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<Session>>;
}

/// Settings shared by the store adapters for reading credentials off a request.
#[derive(Debug, Clone)]
pub struct CredentialSettings {
    pub api_key_header: HeaderName,
    pub session_cookie: String,
    /// Mint an implicit session for requests bearing a valid API key
    pub api_key_sessions: bool,
}

impl CredentialSettings {
    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        Ok(Self {
            api_key_header: HeaderName::try_from(config.auth.api_key_header.as_str())?,
            session_cookie: config.auth.session.cookie_name.clone(),
            api_key_sessions: config.auth.session.api_key_sessions,
        })
    }

    /// The API key presented on a request, if the header is present and readable.
    pub fn api_key<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers.get(&self.api_key_header).and_then(|v| v.to_str().ok()).map(str::trim)
    }

    /// The session token carried in the session cookie, if any.
    pub fn session_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|cookie| cookie.trim().split_once('='))
            .find(|(name, value)| *name == self.session_cookie && !value.is_empty())
            .map(|(_, value)| value)
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            api_key_header: HeaderName::from_static("x-api-key"),
            session_cookie: "quizctl.session_token".to_string(),
            api_key_sessions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn record(enabled: bool, expires_at: Option<DateTime<Utc>>) -> ApiKeyRecord {
        ApiKeyRecord {
            id: "key-1".to_string(),
            name: "ci".to_string(),
            user_id: "u1".to_string(),
            permissions: None,
            expires_at,
            enabled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_verify_at() {
        let now = Utc::now();
        let hour = chrono::Duration::hours(1);

        assert!(matches!(record(true, None).verify_at(now), KeyVerification::Valid(_)));
        assert!(matches!(record(true, Some(now + hour)).verify_at(now), KeyVerification::Valid(_)));
        assert_eq!(
            record(true, Some(now - hour)).verify_at(now),
            KeyVerification::Rejected(KeyRejection::Expired)
        );
        assert_eq!(
            record(true, Some(now)).verify_at(now),
            KeyVerification::Rejected(KeyRejection::Expired)
        );
        assert_eq!(record(false, None).verify_at(now), KeyVerification::Rejected(KeyRejection::Revoked));
    }

    #[test]
    fn test_expiry_from_never_overflows() {
        let now = Utc::now();
        assert_eq!(expiry_from(now, None).unwrap(), None);
        assert_eq!(
            expiry_from(now, Some(Duration::from_secs(60))).unwrap(),
            Some(now + chrono::Duration::seconds(60))
        );
        assert!(matches!(
            expiry_from(now, Some(Duration::from_secs(1_000_000_000_000_000))),
            Err(StoreError::Unavailable(_))
        ));
        assert!(expiry_from(now, Some(Duration::MAX)).is_err());
    }

    #[test]
    fn test_session_token_from_cookies() {
        let settings = CredentialSettings::default();
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; quizctl.session_token=abc123"));
        assert_eq!(settings.session_token(&headers), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("quizctl.session_token=def"));
        assert_eq!(settings.session_token(&headers), Some("def"));

        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("quizctl.session_token="));
        assert_eq!(settings.session_token(&headers), None);
        assert_eq!(settings.session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_api_key_from_header() {
        let settings = CredentialSettings::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("qz_secret"));
        assert_eq!(settings.api_key(&headers), Some("qz_secret"));
        assert_eq!(settings.api_key(&HeaderMap::new()), None);
    }
}
