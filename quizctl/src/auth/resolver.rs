//! Resolution of a request's [`AuthorizationContext`].
//!
//! Two channels are tried in a fixed order, the first to succeed wins:
//!
//! 1. **API key**: the key from the API key header is verified against the key store. The
//!    identity comes from the implicit session the key store associates with the key, which must
//!    belong to the key's owner. Permissions are the key's own, normalized; they are never widened
//!    by the owner's roles.
//! 2. **Session**: the session cookie is looked up in the session store. Permissions are the full
//!    catalog for administrators and the baseline set for everyone else.
//!
//! A channel that fails (rejected key, store error, timeout) is logged and the next channel is
//! tried. Resolution itself never fails: a request that no channel accepts resolves to `None`.

use axum::http::HeaderMap;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use super::context::AuthorizationContext;
use super::permissions::{StoredPermissions, normalize};
use super::roles::RoleDeriver;
use super::scopes::{Scope, baseline_scopes, full_catalog};
use crate::store::{self, ApiKeyStore, CredentialSettings, KeyRejection, KeyVerification, SessionOrigin, SessionStore, StoreError};
use crate::types::{Channel, abbrev_id};

/// Default bound on a single call to an external store.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a channel that was attempted did not produce a context.
#[derive(Debug, Error)]
enum ChannelFailure {
    #[error("API key rejected: {0:?}")]
    KeyRejected(KeyRejection),

    #[error("no implicit session for API key owned by {owner}")]
    MissingKeySession { owner: String },

    #[error("implicit session belongs to {session_user}, API key is owned by {owner}")]
    OwnerMismatch { owner: String, session_user: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AuthContextResolver {
    api_keys: Arc<dyn ApiKeyStore>,
    sessions: Arc<dyn SessionStore>,
    roles: RoleDeriver,
    settings: CredentialSettings,
    store_timeout: Duration,
}

impl AuthContextResolver {
    pub fn new(
        api_keys: Arc<dyn ApiKeyStore>,
        sessions: Arc<dyn SessionStore>,
        roles: RoleDeriver,
        settings: CredentialSettings,
        store_timeout: Duration,
    ) -> Self {
        Self {
            api_keys,
            sessions,
            roles,
            settings,
            store_timeout,
        }
    }

    pub fn roles(&self) -> &RoleDeriver {
        &self.roles
    }

    /// Resolve the context of a request from its headers. Returns `None` when the request is
    /// unauthenticated.
    #[instrument(skip_all)]
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<AuthorizationContext> {
        for channel in Channel::RESOLUTION_ORDER {
            let attempt = match channel {
                Channel::ApiKey => self.try_api_key_channel(headers).await,
                Channel::Session => self.try_session_channel(headers).await,
            };

            match attempt {
                Some(Ok(ctx)) => {
                    debug!(%channel, user_id = %abbrev_id(ctx.user_id()), "resolved authorization context");
                    return Some(ctx);
                }
                Some(Err(ChannelFailure::Store(e))) => {
                    warn!(%channel, "store error during authentication, trying next channel: {e}");
                }
                Some(Err(e)) => {
                    debug!(%channel, "authentication failed: {e}");
                }
                None => {
                    trace!(%channel, "no credentials for channel");
                }
            }
        }

        trace!("request is unauthenticated");
        None
    }

    /// Returns:
    /// - None: no API key on the request
    /// - Some(Ok(ctx)): key valid and bound to its owner's session
    /// - Some(Err(failure)): key present but not accepted
    async fn try_api_key_channel(&self, headers: &HeaderMap) -> Option<Result<AuthorizationContext, ChannelFailure>> {
        let secret = self.settings.api_key(headers).filter(|s| !s.is_empty())?;
        Some(self.authenticate_api_key(secret, headers).await)
    }

    async fn authenticate_api_key(&self, secret: &str, headers: &HeaderMap) -> Result<AuthorizationContext, ChannelFailure> {
        let record = match self.bounded(self.api_keys.verify_key(secret)).await? {
            KeyVerification::Valid(record) => record,
            KeyVerification::Rejected(rejection) => return Err(ChannelFailure::KeyRejected(rejection)),
        };

        let session = self
            .bounded(self.sessions.get_session(headers))
            .await?
            .ok_or_else(|| ChannelFailure::MissingKeySession {
                owner: record.user_id.clone(),
            })?;

        if session.user.id != record.user_id {
            return Err(ChannelFailure::OwnerMismatch {
                owner: record.user_id,
                session_user: session.user.id,
            });
        }

        let permissions = normalize(StoredPermissions::parse(record.permissions.as_deref()).as_ref());
        trace!(key_id = %abbrev_id(&record.id), scopes = permissions.len(), "API key verified");
        Ok(AuthorizationContext::new(session.user, permissions, Channel::ApiKey))
    }

    /// Returns:
    /// - None: no live cookie session on the request
    /// - Some(Ok(ctx)): cookie session found
    /// - Some(Err(failure)): the session store could not be consulted
    async fn try_session_channel(&self, headers: &HeaderMap) -> Option<Result<AuthorizationContext, ChannelFailure>> {
        let session = match self.bounded(self.sessions.get_session(headers)).await {
            Ok(session) => session?,
            Err(e) => return Some(Err(e.into())),
        };

        // Implicit key sessions only count through the API key channel
        if session.origin != SessionOrigin::Cookie {
            trace!("ignoring implicit API key session");
            return None;
        }

        let permissions = self.session_permissions(&session.user);
        Some(Ok(AuthorizationContext::new(session.user, permissions, Channel::Session)))
    }

    fn session_permissions(&self, user: &store::User) -> BTreeSet<Scope> {
        if self.roles.is_admin(user) {
            full_catalog()
        } else {
            baseline_scopes()
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = store::Result<T>>) -> store::Result<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }
}
