//! Extractors exposing the resolved [`AuthorizationContext`] to handlers.
//!
//! Resolution runs at most once per request: the outcome (including "unauthenticated") is
//! stored in the request extensions and reused by every extractor that follows.

use crate::{
    AppState,
    auth::{context::AuthorizationContext, scopes::required::ScopeMarker},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use std::marker::PhantomData;
use tracing::{instrument, trace};

/// Outcome of resolution for the current request.
#[derive(Clone)]
struct Resolved(Option<AuthorizationContext>);

#[instrument(skip(parts, state))]
async fn resolve_once(parts: &mut Parts, state: &AppState) -> Option<AuthorizationContext> {
    if let Some(Resolved(ctx)) = parts.extensions.get::<Resolved>() {
        trace!("reusing resolved authorization context");
        return ctx.clone();
    }

    let ctx = state.resolver.resolve(&parts.headers).await;
    parts.extensions.insert(Resolved(ctx.clone()));
    ctx
}

/// Rejects unauthenticated requests with 401.
impl FromRequestParts<AppState> for AuthorizationContext {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve_once(parts, state).await.ok_or(Error::Unauthenticated)
    }
}

/// The context if one could be resolved. Never rejects; for handlers that apply their own
/// guards (key lifecycle) or serve both anonymous and signed-in callers.
#[derive(Debug, Clone)]
pub struct MaybeAuthorized(pub Option<AuthorizationContext>);

impl FromRequestParts<AppState> for MaybeAuthorized {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        Ok(MaybeAuthorized(resolve_once(parts, state).await))
    }
}

/// A context holding the scope named by `S`, checked through the shared permission gate.
/// Rejects with 401 when unauthenticated and 403 when the scope is missing.
///
/// ```ignore
/// async fn list(RequiresScope(ctx, ..): RequiresScope<ApiKeysRead>) -> Result<..> { .. }
/// ```
#[derive(Debug, Clone)]
pub struct RequiresScope<S: ScopeMarker>(pub AuthorizationContext, pub PhantomData<S>);

impl<S: ScopeMarker> RequiresScope<S> {
    pub fn into_inner(self) -> AuthorizationContext {
        self.0
    }
}

impl<S: ScopeMarker> FromRequestParts<AppState> for RequiresScope<S> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let ctx = resolve_once(parts, state).await;
        state.gate.require(ctx.as_ref(), S::SCOPE).into_result()?;
        ctx.map(|ctx| RequiresScope(ctx, PhantomData))
            .ok_or(Error::Unauthenticated)
    }
}
