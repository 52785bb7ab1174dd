//! Guards around API key creation and deletion.
//!
//! Both operations are administrator-only. Creation validates the request against the scope
//! catalog and fails loudly on unknown scopes, unlike read-time normalization which silently
//! drops them. Every validation happens before the key store is contacted.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use super::context::AuthorizationContext;
use super::gate::Denial;
use super::permissions::expand_resource_map;
use super::roles::RoleDeriver;
use super::scopes::Scope;
use crate::api::models::api_keys::ApiKeyCreate;
use crate::store::{ApiKeyRecord, ApiKeyStore, CreatedApiKey, NewApiKey, StoreError};
use crate::types::{Channel, abbrev_id};

#[derive(Debug, Error)]
pub enum KeyLifecycleError {
    #[error("{}", .0.message())]
    Denied(Denial),

    #[error("Only admins can {action} API keys")]
    NotAdmin { action: &'static str },

    #[error("Key name is required")]
    EmptyName,

    #[error("At least one permission is required")]
    EmptyPermissions,

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Expiry must be a positive number of seconds")]
    InvalidExpiry,

    #[error("Expiry is too far in the future")]
    ExpiryOutOfRange,

    #[error("API key not found")]
    NotFound { key_id: String },

    #[error("Failed to {operation}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

/// The caller must be an administrator. Callers on the API key channel also need
/// `apikeys:write` on the key itself, so a narrow key cannot be used to mint wider ones.
fn require_key_admin<'a>(
    caller: Option<&'a AuthorizationContext>,
    roles: &RoleDeriver,
    action: &'static str,
) -> Result<&'a AuthorizationContext, KeyLifecycleError> {
    let caller = caller.ok_or(KeyLifecycleError::Denied(Denial::Unauthenticated))?;

    if !roles.is_admin(caller.user()) {
        return Err(KeyLifecycleError::NotAdmin { action });
    }
    if caller.channel() == Channel::ApiKey && !caller.has_permission(Scope::ApiKeysWrite) {
        return Err(KeyLifecycleError::Denied(Denial::Forbidden {
            missing: Scope::ApiKeysWrite,
        }));
    }

    Ok(caller)
}

/// The instant `seconds` from now, or `None` when it is past the representable range.
fn expiry_after_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds).and_then(|delta| Utc::now().checked_add_signed(delta))
}

/// Check a creation request without touching the store, returning the trimmed name.
fn validate_create(request: &ApiKeyCreate) -> Result<&str, KeyLifecycleError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(KeyLifecycleError::EmptyName);
    }

    let requested = expand_resource_map(&request.permissions);
    if requested.is_empty() {
        return Err(KeyLifecycleError::EmptyPermissions);
    }
    if let Some(invalid) = requested.into_iter().find(|scope| !Scope::is_valid(scope)) {
        return Err(KeyLifecycleError::InvalidPermission(invalid));
    }

    if let Some(seconds) = request.expires_in_seconds {
        if seconds <= 0 {
            return Err(KeyLifecycleError::InvalidExpiry);
        }
        if expiry_after_seconds(seconds).is_none() {
            return Err(KeyLifecycleError::ExpiryOutOfRange);
        }
    }

    Ok(name)
}

#[instrument(skip_all, fields(name = %request.name))]
pub async fn create_api_key(
    caller: Option<&AuthorizationContext>,
    request: &ApiKeyCreate,
    store: &dyn ApiKeyStore,
    roles: &RoleDeriver,
) -> Result<CreatedApiKey, KeyLifecycleError> {
    let caller = require_key_admin(caller, roles, "create")?;
    let name = validate_create(request)?;

    let created = store
        .create_key(NewApiKey {
            user_id: caller.user_id().to_string(),
            name: name.to_string(),
            expires_in: request
                .expires_in_seconds
                .and_then(|seconds| u64::try_from(seconds).ok())
                .map(Duration::from_secs),
            permissions: request.permissions.clone(),
        })
        .await
        .map_err(|source| KeyLifecycleError::Store {
            operation: "create API key",
            source,
        })?;

    info!(key_id = %abbrev_id(&created.record.id), user_id = %abbrev_id(caller.user_id()), "API key created");
    Ok(created)
}

#[instrument(skip(caller, store, roles), fields(key_id = %abbrev_id(key_id)))]
pub async fn delete_api_key(
    caller: Option<&AuthorizationContext>,
    key_id: &str,
    store: &dyn ApiKeyStore,
    roles: &RoleDeriver,
) -> Result<(), KeyLifecycleError> {
    let caller = require_key_admin(caller, roles, "delete")?;

    let deleted = store.delete_key(key_id).await.map_err(|source| KeyLifecycleError::Store {
        operation: "delete API key",
        source,
    })?;
    if !deleted {
        return Err(KeyLifecycleError::NotFound {
            key_id: key_id.to_string(),
        });
    }

    info!(user_id = %abbrev_id(caller.user_id()), "API key deleted");
    Ok(())
}

/// Keys owned by the caller. Scope checks are the caller's responsibility.
pub async fn list_api_keys(caller: &AuthorizationContext, store: &dyn ApiKeyStore) -> Result<Vec<ApiKeyRecord>, KeyLifecycleError> {
    store
        .list_keys(caller.user_id())
        .await
        .map_err(|source| KeyLifecycleError::Store {
            operation: "list API keys",
            source,
        })
}
