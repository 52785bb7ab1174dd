//! Authentication and authorization core.
//!
//! Every request is resolved to an optional [`AuthorizationContext`](context::AuthorizationContext):
//! who the caller is, which scopes they hold, and through which channel that was established.
//!
//! # Authentication Channels
//!
//! ## 1. API Key
//!
//! Programmatic access:
//! - Key passed in the `x-api-key` header (configurable)
//! - Verified by the external key store; expired and revoked keys are rejected
//! - Scopes are the key's own stored permissions, normalized against the catalog
//!
//! ## 2. Session
//!
//! Browser access after OIDC login:
//! - Session token carried in the session cookie
//! - Administrators (members of the configured admin group) get the full catalog
//! - Everyone else gets the baseline reader/writer scopes
//!
//! The API key channel is always tried first. A failing channel falls through to the next.
//!
//! # Authorization
//!
//! - **Scopes**: closed catalog of `resource:action` capabilities ([`scopes`])
//! - **Roles**: admin status derived from the groups claim ([`roles`])
//! - **Ownership**: owners and admins may edit a resource ([`gate`])
//!
//! # Modules
//!
//! - [`context`]: The resolved per-request context
//! - [`current_user`]: Extractors for getting the context in handlers
//! - [`gate`]: Scope requirements and ownership checks
//! - [`key_lifecycle`]: Guarded API key creation and deletion
//! - [`permissions`]: Normalization of stored API key permissions
//! - [`resolver`]: Channel-by-channel context resolution
//! - [`roles`]: Admin role derivation
//! - [`scopes`]: The scope catalog
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use quizctl::auth::current_user::RequiresScope;
//! use quizctl::auth::scopes::required::QuizzesWrite;
//!
//! async fn update_quiz(
//!     RequiresScope(ctx, ..): RequiresScope<QuizzesWrite>,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Quiz>> {
//!     let quiz = load_quiz(..).await?;
//!     if !state.gate.can_edit_resource(&ctx, &quiz.author_id) {
//!         return Err(Error::InsufficientPermissions { required: Scope::QuizzesWrite });
//!     }
//!     ..
//! }
//! ```

pub mod context;
pub mod current_user;
pub mod gate;
pub mod key_lifecycle;
pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod scopes;
