//! The closed catalog of capability scopes.
//!
//! A scope is rendered on the wire as `resource:action` (for example `quizzes:write`). The set
//! is fixed at build time: adding a capability means adding a variant here. Everything that
//! accepts scope strings from the outside (stored key permissions, key creation requests)
//! validates against this catalog, and since [`Scope`] is an enum, every scope that reaches
//! calling code is a catalog member by construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Scope {
    #[serde(rename = "quizzes:read")]
    QuizzesRead,
    #[serde(rename = "quizzes:write")]
    QuizzesWrite,
    #[serde(rename = "attempts:read")]
    AttemptsRead,
    #[serde(rename = "attempts:write")]
    AttemptsWrite,
    #[serde(rename = "leaderboard:read")]
    LeaderboardRead,
    #[serde(rename = "apikeys:read")]
    ApiKeysRead,
    #[serde(rename = "apikeys:write")]
    ApiKeysWrite,
}

/// Candidate string that is not part of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scope: {0}")]
pub struct UnknownScope(pub String);

impl Scope {
    /// Every scope in the catalog.
    pub const ALL: [Scope; 7] = [
        Scope::QuizzesRead,
        Scope::QuizzesWrite,
        Scope::AttemptsRead,
        Scope::AttemptsWrite,
        Scope::LeaderboardRead,
        Scope::ApiKeysRead,
        Scope::ApiKeysWrite,
    ];

    /// Scopes granted to every signed-in, non-admin browser user.
    pub const BASELINE: [Scope; 3] = [Scope::QuizzesRead, Scope::AttemptsRead, Scope::AttemptsWrite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::QuizzesRead => "quizzes:read",
            Scope::QuizzesWrite => "quizzes:write",
            Scope::AttemptsRead => "attempts:read",
            Scope::AttemptsWrite => "attempts:write",
            Scope::LeaderboardRead => "leaderboard:read",
            Scope::ApiKeysRead => "apikeys:read",
            Scope::ApiKeysWrite => "apikeys:write",
        }
    }

    /// The resource half of the scope string.
    pub fn resource(&self) -> &'static str {
        self.split().0
    }

    /// The action half of the scope string.
    pub fn action(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        // Every catalog string contains exactly one ':'
        self.as_str().split_once(':').unwrap_or((self.as_str(), ""))
    }

    /// Whether `candidate` names a catalog scope. Matching is exact and case-sensitive.
    pub fn is_valid(candidate: &str) -> bool {
        candidate.parse::<Scope>().is_ok()
    }

    /// Build a scope from a `(resource, action)` pair, as stored by the resource-map encoding.
    pub fn from_parts(resource: &str, action: &str) -> Result<Scope, UnknownScope> {
        format!("{resource}:{action}").parse()
    }
}

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| UnknownScope(s.to_string()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full catalog as a set.
pub fn full_catalog() -> BTreeSet<Scope> {
    Scope::ALL.into_iter().collect()
}

/// The fixed baseline reader/writer subset.
pub fn baseline_scopes() -> BTreeSet<Scope> {
    Scope::BASELINE.into_iter().collect()
}

/// Type-level scope markers, used by [`RequiresScope`](crate::auth::current_user::RequiresScope)
/// to declare the scope a handler needs in its signature.
pub mod required {
    use super::Scope;

    pub trait ScopeMarker: Send + Sync + 'static {
        const SCOPE: Scope;
    }

    macro_rules! scope_markers {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy)]
                pub struct $name;

                impl ScopeMarker for $name {
                    const SCOPE: Scope = Scope::$name;
                }
            )*
        };
    }

    scope_markers!(
        QuizzesRead,
        QuizzesWrite,
        AttemptsRead,
        AttemptsWrite,
        LeaderboardRead,
        ApiKeysRead,
        ApiKeysWrite,
    );
}
