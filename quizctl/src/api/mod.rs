//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! All routes are served under `/api/v1`:
//!
//! - **Scopes** (`/scopes`): The scope catalog, public
//! - **Auth context** (`/auth/context`): The caller's resolved identity and scopes
//! - **API keys** (`/api-keys/*`): Listing, and administrator-only creation and deletion
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at
//! `/api/v1/openapi.json` and rendered at `/api/docs`.

pub mod handlers;
pub mod models;
