//! The resolved identity of a request.

use std::collections::BTreeSet;

use super::scopes::Scope;
use crate::store::User;
use crate::types::Channel;

/// Who is making a request, what they may do, and how that was established.
///
/// Produced once per request by the [`AuthContextResolver`](super::resolver::AuthContextResolver)
/// and never modified afterwards. Every scope in `permissions` is a catalog member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    user: User,
    permissions: BTreeSet<Scope>,
    channel: Channel,
}

impl AuthorizationContext {
    pub(crate) fn new(user: User, permissions: BTreeSet<Scope>, channel: Channel) -> Self {
        Self {
            user,
            permissions,
            channel,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn permissions(&self) -> &BTreeSet<Scope> {
        &self.permissions
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn has_permission(&self, scope: Scope) -> bool {
        self.permissions.contains(&scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_user;

    #[test]
    fn test_has_permission() {
        let ctx = AuthorizationContext::new(
            test_user("u1", None),
            BTreeSet::from([Scope::QuizzesRead]),
            Channel::ApiKey,
        );
        assert!(ctx.has_permission(Scope::QuizzesRead));
        assert!(!ctx.has_permission(Scope::QuizzesWrite));
        assert_eq!(ctx.user_id(), "u1");
        assert_eq!(ctx.channel(), Channel::ApiKey);
    }
}
