//! OpenAPI documentation for the authorization API at `/api/v1/*`.
//!
//! Served as JSON from `/api/v1/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;
use crate::errors::ErrorBody;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "ApiKey".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-api-key",
                    "API key authentication. Include your key in the `x-api-key` header:\n\n\
                    ```\nx-api-key: qz_YOUR_API_KEY\n```\n\n\
                    API keys can only be created by administrators.",
                ))),
            );
            components.security_schemes.insert(
                "SessionCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "quizctl.session_token",
                    "Session established by signing in through the identity provider.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Quiz authorization API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::scopes::list_scopes,
        api::handlers::auth::get_auth_context,
        api::handlers::api_keys::create_api_key,
        api::handlers::api_keys::list_api_keys,
        api::handlers::api_keys::delete_api_key,
    ),
    components(
        schemas(
            ErrorBody,
            crate::types::Channel,
            crate::auth::scopes::Scope,
            api::models::scopes::ScopeInfo,
            api::models::scopes::ScopeCatalogResponse,
            api::models::users::UserResponse,
            api::models::auth::AuthContextResponse,
            api::models::api_keys::ApiKeyCreate,
            api::models::api_keys::ApiKeyCreated,
            api::models::api_keys::ApiKeyInfoResponse,
            api::models::api_keys::ApiKeyDeleted,
        )
    ),
    tags(
        (name = "auth", description = "Scopes and the caller's resolved authorization context"),
        (name = "api_keys", description = "Administrator-managed API keys"),
    ),
    info(
        title = "quizctl API",
        description = "Authorization API for the quiz platform. Callers authenticate with an API key or a session cookie.",
    )
)]
pub struct ApiDoc;
