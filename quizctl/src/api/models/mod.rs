//! API request and response data models.
//!
//! These structures define the public API contract and are kept apart from the store records
//! they are built from. All models are annotated with `utoipa` for the OpenAPI document.
//!
//! - [`api_keys`]: API key creation requests and key metadata (secrets are returned once)
//! - [`auth`]: The resolved authorization context of the caller
//! - [`scopes`]: The scope catalog
//! - [`users`]: User profiles as provided by the identity provider

pub mod api_keys;
pub mod auth;
pub mod scopes;
pub mod users;
