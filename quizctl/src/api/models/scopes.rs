//! API response models for the scope catalog.

use crate::auth::scopes::Scope;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScopeInfo {
    pub scope: Scope,
    pub resource: String,
    pub action: String,
}

impl From<Scope> for ScopeInfo {
    fn from(scope: Scope) -> Self {
        Self {
            scope,
            resource: scope.resource().to_string(),
            action: scope.action().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScopeCatalogResponse {
    /// Every scope an API key may be granted
    pub scopes: Vec<ScopeInfo>,
    /// Scopes held by every signed-in non-admin user
    pub baseline: Vec<Scope>,
}
