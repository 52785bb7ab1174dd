//! API response models for the resolved authorization context.

use super::users::UserResponse;
use crate::auth::context::AuthorizationContext;
use crate::auth::roles::RoleDeriver;
use crate::auth::scopes::Scope;
use crate::types::Channel;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthContextResponse {
    pub user: UserResponse,
    /// Scopes held by the caller, in catalog order
    pub permissions: Vec<Scope>,
    pub channel: Channel,
}

impl AuthContextResponse {
    pub fn from_context(ctx: &AuthorizationContext, roles: &RoleDeriver) -> Self {
        Self {
            user: UserResponse::from_user(ctx.user(), roles),
            permissions: ctx.permissions().iter().copied().collect(),
            channel: ctx.channel(),
        }
    }
}
