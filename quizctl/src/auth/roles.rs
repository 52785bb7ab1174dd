//! Administrator role derivation from federated group claims.
//!
//! The identity provider hands us the user's groups as a JSON-serialized array stored on the
//! user record. Anything that is not a well-formed array of strings is treated as "no groups":
//! malformed input must never grant elevated privileges.

use tracing::trace;

use crate::store::User;

/// Group name used when no admin group is configured.
pub const DEFAULT_ADMIN_GROUP: &str = "admin";

/// Decides whether a user is an administrator, based on membership of a configured group.
///
/// Every entry point (API handlers, key lifecycle, page-level checks) shares one instance,
/// constructed from configuration at startup.
#[derive(Debug, Clone)]
pub struct RoleDeriver {
    admin_group: String,
}

impl Default for RoleDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_GROUP)
    }
}

impl RoleDeriver {
    pub fn new(admin_group: impl Into<String>) -> Self {
        Self {
            admin_group: admin_group.into(),
        }
    }

    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// Whether `user` belongs to the admin group. Fails closed on absent or malformed claims.
    pub fn is_admin(&self, user: &User) -> bool {
        let Some(raw) = user.groups.as_deref() else {
            return false;
        };

        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(groups) => groups.iter().any(|g| g == &self.admin_group),
            Err(e) => {
                trace!(user_id = %user.id, "ignoring malformed groups claim: {e}");
                false
            }
        }
    }

    /// Page-level check for quiz management: signed out users can never manage.
    pub fn can_manage(&self, user: Option<&User>) -> bool {
        user.is_some_and(|u| self.is_admin(u))
    }
}

/// Whether `user_id` is the owner (author) of a resource.
pub fn is_author(user_id: &str, owner_id: &str) -> bool {
    user_id == owner_id
}
