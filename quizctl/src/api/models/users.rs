//! API response models for users.

use crate::auth::roles::RoleDeriver;
use crate::store::User;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub preferred_username: Option<String>,
    /// Groups from the identity provider. Malformed claims are reported as no groups.
    pub groups: Vec<String>,
    pub is_admin: bool,
}

impl UserResponse {
    pub fn from_user(user: &User, roles: &RoleDeriver) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            preferred_username: user.preferred_username.clone(),
            groups: user
                .groups
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            is_admin: roles.is_admin(user),
        }
    }
}
