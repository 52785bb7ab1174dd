//! Scope and ownership checks performed before a guarded operation.
//!
//! One [`PermissionGate`] is shared by API handlers and page-level callers, so both apply the
//! same role derivation.

use axum::http::StatusCode;

use super::context::AuthorizationContext;
use super::roles::{RoleDeriver, is_author};
use super::scopes::Scope;
use crate::errors::Error;
use crate::store::User;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No identity could be resolved
    Unauthenticated,
    /// Identity resolved but the scope is missing
    Forbidden { missing: Scope },
}

impl Denial {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Denial::Unauthenticated => StatusCode::UNAUTHORIZED,
            Denial::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Denial::Unauthenticated => "Unauthorized".to_string(),
            Denial::Forbidden { missing } => format!("Missing required permission: {missing}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    roles: RoleDeriver,
}

impl PermissionGate {
    pub fn new(roles: RoleDeriver) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &RoleDeriver {
        &self.roles
    }

    pub fn require(&self, ctx: Option<&AuthorizationContext>, scope: Scope) -> Decision {
        match ctx {
            None => Decision::Deny(Denial::Unauthenticated),
            Some(ctx) if !ctx.has_permission(scope) => {
                tracing::debug!(user_id = %ctx.user_id(), channel = %ctx.channel(), %scope, "missing scope");
                Decision::Deny(Denial::Forbidden { missing: scope })
            }
            Some(_) => Decision::Allow,
        }
    }

    /// Whether the caller may edit or delete a resource owned by `owner_id`: the owner always
    /// can, administrators can edit anything.
    pub fn can_edit_resource(&self, ctx: &AuthorizationContext, owner_id: &str) -> bool {
        self.can_edit_as(Some(ctx.user()), owner_id)
    }

    /// Same as [`can_edit_resource`](Self::can_edit_resource) for callers that only hold a user.
    pub fn can_edit_as(&self, user: Option<&User>, owner_id: &str) -> bool {
        user.is_some_and(|user| is_author(&user.id, owner_id) || self.roles.is_admin(user))
    }
}
