//! Common type definitions.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, ApiKeyId)
//! - The authentication [`Channel`] a request was resolved through
//!
//! # ID Types
//!
//! Users are owned by the external identity provider, which hands out opaque string
//! identifiers. API key ids follow the same convention so both can be stored side by side.
//!
//! # Utility Functions
//!
//! - [`abbrev_id`]: Abbreviate ids to their first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

// Type aliases for IDs
pub type UserId = String;
pub type ApiKeyId = String;

/// Abbreviate an id to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// How the identity of a request was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Browser session carried by the session cookie
    Session,
    /// Programmatic access through the API key header
    ApiKey,
}

impl Channel {
    /// Order in which channels are attempted during resolution. The API key channel always
    /// completes before the session channel starts.
    pub const RESOLUTION_ORDER: [Channel; 2] = [Channel::ApiKey, Channel::Session];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Session => write!(f, "session"),
            Channel::ApiKey => write!(f, "api_key"),
        }
    }
}
