//! HTTP request handlers for all API endpoints.
//!
//! Handlers obtain the caller's authorization context through the extractors in
//! [`crate::auth::current_user`] and return [`crate::errors::Error`], which converts to the
//! matching HTTP status and a JSON `{"error": ...}` body.
//!
//! # Handler Modules
//!
//! - [`api_keys`]: API key creation, listing, and deletion
//! - [`auth`]: The caller's resolved authorization context
//! - [`scopes`]: The scope catalog

pub mod api_keys;
pub mod auth;
pub mod scopes;
