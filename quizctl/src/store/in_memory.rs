//! In-memory identity store.
//!
//! Stores users, sessions and API keys in concurrent maps. It's suitable for tests and local
//! development without a database; everything is lost on restart. The store can be switched
//! into an "unavailable" mode where every call fails, to exercise store-failure handling.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::{
    ApiKeyRecord, ApiKeyStore, CreatedApiKey, CredentialSettings, KeyRejection, KeyVerification, NewApiKey, Result, Session,
    SessionOrigin, SessionStore, StoreError, User, expiry_from,
};
use crate::crypto::{generate_api_key, generate_session_token, hash_api_key};
use crate::types::{ApiKeyId, UserId};

#[derive(Clone)]
struct StoredSession {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

struct Inner {
    settings: CredentialSettings,
    users: DashMap<UserId, User>,
    keys: DashMap<ApiKeyId, ApiKeyRecord>,
    /// Secret hash to key id
    key_hashes: DashMap<String, ApiKeyId>,
    sessions: DashMap<String, StoredSession>,
    unavailable: AtomicBool,
    key_store_calls: AtomicUsize,
}

/// In-memory implementation of [`ApiKeyStore`] and [`SessionStore`].
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(CredentialSettings::default())
    }
}

impl InMemoryStore {
    pub fn new(settings: CredentialSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                users: DashMap::new(),
                keys: DashMap::new(),
                key_hashes: DashMap::new(),
                sessions: DashMap::new(),
                unavailable: AtomicBool::new(false),
                key_store_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn insert_user(&self, user: User) {
        self.inner.users.insert(user.id.clone(), user);
    }

    /// Start a cookie session for `user_id`, returning the session token.
    pub fn create_session(&self, user_id: &str, ttl: chrono::Duration) -> String {
        let token = generate_session_token();
        self.inner.sessions.insert(
            token.clone(),
            StoredSession {
                user_id: user_id.to_string(),
                expires_at: Utc::now() + ttl,
            },
        );
        token
    }

    /// Store a key with an arbitrary raw permission payload, bypassing creation-time validation.
    /// Returns the record and its secret.
    pub fn insert_key(
        &self,
        user_id: &str,
        name: &str,
        permissions: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> (ApiKeyRecord, String) {
        let secret = generate_api_key();
        let record = ApiKeyRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            user_id: user_id.to_string(),
            permissions: permissions.map(str::to_string),
            expires_at,
            enabled: true,
            created_at: Utc::now(),
        };
        self.inner.key_hashes.insert(hash_api_key(&secret), record.id.clone());
        self.inner.keys.insert(record.id.clone(), record.clone());
        (record, secret)
    }

    /// Disable a key without deleting it.
    pub fn revoke_key(&self, key_id: &str) {
        if let Some(mut record) = self.inner.keys.get_mut(key_id) {
            record.enabled = false;
        }
    }

    /// Make every subsequent store call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of calls made through the [`ApiKeyStore`] interface.
    pub fn key_store_calls(&self) -> usize {
        self.inner.key_store_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    fn key_store_call(&self) -> Result<()> {
        self.inner.key_store_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }

    fn lookup_key(&self, secret: &str) -> KeyVerification {
        let record = self
            .inner
            .key_hashes
            .get(&hash_api_key(secret))
            .and_then(|key_id| self.inner.keys.get(key_id.value()).map(|record| record.clone()));
        match record {
            Some(record) => record.verify_at(Utc::now()),
            None => KeyVerification::Rejected(KeyRejection::Unknown),
        }
    }

    fn user(&self, user_id: &str) -> Option<User> {
        self.inner.users.get(user_id).map(|u| u.clone())
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryStore {
    async fn verify_key(&self, secret: &str) -> Result<KeyVerification> {
        self.key_store_call()?;
        Ok(self.lookup_key(secret))
    }

    async fn create_key(&self, request: NewApiKey) -> Result<CreatedApiKey> {
        self.key_store_call()?;

        let expires_at = expiry_from(Utc::now(), request.expires_in)?;
        let permissions = serde_json::to_string(&request.permissions)
            .map_err(|e| StoreError::Unavailable(format!("failed to encode permissions: {e}")))?;

        let (record, secret) = self.insert_key(&request.user_id, &request.name, Some(&permissions), expires_at);
        debug!(key_id = %record.id, "created in-memory API key");
        Ok(CreatedApiKey { record, secret })
    }

    async fn delete_key(&self, key_id: &str) -> Result<bool> {
        self.key_store_call()?;
        self.inner.key_hashes.retain(|_, id| id.as_str() != key_id);
        Ok(self.inner.keys.remove(key_id).is_some())
    }

    async fn list_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>> {
        self.key_store_call()?;
        let mut keys: Vec<ApiKeyRecord> = self
            .inner
            .keys
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(keys)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        self.check_available()?;
        let settings = &self.inner.settings;

        // A valid API key with a known owner takes precedence over the cookie
        if settings.api_key_sessions
            && let Some(secret) = settings.api_key(headers)
            && let KeyVerification::Valid(record) = self.lookup_key(secret)
            && let Some(user) = self.user(&record.user_id)
        {
            return Ok(Some(Session {
                user,
                expires_at: record.expires_at,
                origin: SessionOrigin::ApiKey,
            }));
        }

        let Some(token) = settings.session_token(headers) else {
            return Ok(None);
        };
        let Some(session) = self.inner.sessions.get(token).map(|s| s.clone()) else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(self.user(&session.user_id).map(|user| Session {
            user,
            expires_at: Some(session.expires_at),
            origin: SessionOrigin::Cookie,
        }))
    }
}
