//! API request/response models for API keys.

use crate::store::ApiKeyRecord;
use crate::types::{ApiKeyId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// API Key request models.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreate {
    pub name: String,
    /// Lifetime of the key in seconds (null = never expires)
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
    /// Resource name mapped to the actions granted on it, e.g. `{"quizzes": ["read"]}`
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
}

// API Key response models

/// Returned once, at creation. This is the only time the secret leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreated {
    pub key: String,
    pub id: ApiKeyId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyInfoResponse {
    pub id: ApiKeyId,
    pub name: String,
    pub user_id: UserId,
    /// Raw stored permission payload
    pub permissions: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKeyRecord> for ApiKeyInfoResponse {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            permissions: record
                .permissions
                .as_deref()
                .map(|raw| serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))),
            id: record.id,
            name: record.name,
            user_id: record.user_id,
            expires_at: record.expires_at,
            enabled: record.enabled,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyDeleted {
    pub success: bool,
}
