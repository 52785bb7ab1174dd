use crate::{
    AppState,
    api::models::api_keys::{ApiKeyCreate, ApiKeyCreated, ApiKeyDeleted, ApiKeyInfoResponse},
    auth::{
        current_user::{MaybeAuthorized, RequiresScope},
        key_lifecycle,
        scopes::required::ApiKeysRead,
    },
    errors::{ErrorBody, Result},
    types::ApiKeyId,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// Create an API key owned by the caller.
///
/// This is the only time the key secret is returned in a response.
#[utoipa::path(
    post,
    path = "/api-keys",
    tag = "api_keys",
    summary = "Create API key",
    description = "Create an API key for the calling administrator, granting the given resource actions",
    request_body = ApiKeyCreate,
    responses(
        (status = 201, description = "API key created successfully", body = ApiKeyCreated),
        (status = 400, description = "Invalid request, or caller is not an administrator", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "API key lacks apikeys:write", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
    security(
        ("ApiKey" = []),
        ("SessionCookie" = [])
    )
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    MaybeAuthorized(caller): MaybeAuthorized,
    Json(data): Json<ApiKeyCreate>,
) -> Result<(StatusCode, Json<ApiKeyCreated>)> {
    let created = key_lifecycle::create_api_key(caller.as_ref(), &data, state.api_keys.as_ref(), state.gate.roles()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreated {
            key: created.secret,
            id: created.record.id,
        }),
    ))
}

/// List the caller's API keys. Secrets are never included.
#[utoipa::path(
    get,
    path = "/api-keys",
    tag = "api_keys",
    summary = "List API keys",
    responses(
        (status = 200, description = "The caller's API keys", body = [ApiKeyInfoResponse]),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Missing apikeys:read", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
    security(
        ("ApiKey" = []),
        ("SessionCookie" = [])
    )
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    RequiresScope(ctx, ..): RequiresScope<ApiKeysRead>,
) -> Result<Json<Vec<ApiKeyInfoResponse>>> {
    let keys = key_lifecycle::list_api_keys(&ctx, state.api_keys.as_ref()).await?;
    Ok(Json(keys.into_iter().map(ApiKeyInfoResponse::from).collect()))
}

/// Delete an API key.
#[utoipa::path(
    delete,
    path = "/api-keys/{key_id}",
    tag = "api_keys",
    summary = "Delete API key",
    params(
        ("key_id" = String, Path, description = "API key ID"),
    ),
    responses(
        (status = 200, description = "API key deleted", body = ApiKeyDeleted),
        (status = 400, description = "Caller is not an administrator", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "API key lacks apikeys:write", body = ErrorBody),
        (status = 404, description = "API key not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
    security(
        ("ApiKey" = []),
        ("SessionCookie" = [])
    )
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    MaybeAuthorized(caller): MaybeAuthorized,
    Path(key_id): Path<ApiKeyId>,
) -> Result<Json<ApiKeyDeleted>> {
    key_lifecycle::delete_api_key(caller.as_ref(), &key_id, state.api_keys.as_ref(), state.gate.roles()).await?;
    Ok(Json(ApiKeyDeleted { success: true }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::api_keys::{ApiKeyCreated, ApiKeyInfoResponse};
    use crate::api::models::auth::AuthContextResponse;
    use crate::auth::scopes::Scope;
    use crate::test_utils::{create_test_app, test_user};
    use crate::types::Channel;
    use serde_json::{Value, json};

    const ADMIN: &str = r#"["admin"]"#;

    fn session_cookie(token: &str) -> String {
        format!("quizctl.session_token={token}")
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_creates_key_and_uses_it() {
        let (server, store) = create_test_app();
        store.insert_user(test_user("root", Some(ADMIN)));
        let token = store.create_session("root", chrono::Duration::hours(1));

        let response = server
            .post("/api/v1/api-keys")
            .add_header("cookie", session_cookie(&token))
            .json(&json!({
                "name": "grader",
                "expiresInSeconds": 3600,
                "permissions": {"attempts": ["read", "write"]},
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let created: ApiKeyCreated = response.json();
        assert!(created.key.starts_with("qz_"));

        // The new key authenticates with exactly the granted scopes
        let response = server.get("/api/v1/auth/context").add_header("x-api-key", created.key).await;
        response.assert_status_ok();
        let ctx: AuthContextResponse = response.json();
        assert_eq!(ctx.channel, Channel::ApiKey);
        assert_eq!(ctx.permissions, vec![Scope::AttemptsRead, Scope::AttemptsWrite]);
    }

    #[test_log::test(tokio::test)]
    async fn test_create_validation_errors() {
        let (server, store) = create_test_app();
        store.insert_user(test_user("root", Some(ADMIN)));
        let token = store.create_session("root", chrono::Duration::hours(1));

        let cases = [
            (json!({"name": " ", "permissions": {"quizzes": ["read"]}}), "Key name is required"),
            (json!({"name": "ci", "permissions": {}}), "At least one permission is required"),
            (json!({"name": "ci", "permissions": {"quizzes": ["nuke"]}}), "Invalid permission: quizzes:nuke"),
            (
                json!({"name": "ci", "expiresInSeconds": 1_000_000_000_000_000_i64, "permissions": {"quizzes": ["read"]}}),
                "Expiry is too far in the future",
            ),
        ];

        for (body, message) in cases {
            let response = server
                .post("/api/v1/api-keys")
                .add_header("cookie", session_cookie(&token))
                .json(&body)
                .await;
            response.assert_status_bad_request();
            let error: Value = response.json();
            assert_eq!(error["error"], message);
        }

        assert_eq!(store.key_store_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_non_admin_cannot_create_keys() {
        let (server, store) = create_test_app();
        store.insert_user(test_user("alice", None));
        let token = store.create_session("alice", chrono::Duration::hours(1));

        let response = server
            .post("/api/v1/api-keys")
            .add_header("cookie", session_cookie(&token))
            .json(&json!({"name": "ci", "permissions": {"quizzes": ["read"]}}))
            .await;
        response.assert_status_bad_request();
        let error: Value = response.json();
        assert_eq!(error["error"], "Only admins can create API keys");
    }

    #[test_log::test(tokio::test)]
    async fn test_anonymous_create_is_unauthorized() {
        let (server, _store) = create_test_app();

        let response = server
            .post("/api/v1/api-keys")
            .json(&json!({"name": "ci", "permissions": {"quizzes": ["read"]}}))
            .await;
        response.assert_status_unauthorized();
    }

    #[test_log::test(tokio::test)]
    async fn test_narrow_admin_key_cannot_mint_keys() {
        let (server, store) = create_test_app();
        store.insert_user(test_user("root", Some(ADMIN)));
        let (_, secret) = store.insert_key("root", "read-only", Some(r#"["quizzes:read"]"#), None);

        let response = server
            .post("/api/v1/api-keys")
            .add_header("x-api-key", secret)
            .json(&json!({"name": "wider", "permissions": {"apikeys": ["write"]}}))
            .await;
        response.assert_status_forbidden();
        let error: Value = response.json();
        assert_eq!(error["error"], "Missing required permission: apikeys:write");
    }

    #[test_log::test(tokio::test)]
    async fn test_list_requires_apikeys_read() {
        let (server, store) = create_test_app();
        store.insert_user(test_user("alice", None));
        store.insert_user(test_user("root", Some(ADMIN)));
        store.insert_key("root", "mine", Some(r#"["quizzes:read"]"#), None);
        let member = store.create_session("alice", chrono::Duration::hours(1));
        let admin = store.create_session("root", chrono::Duration::hours(1));

        let response = server.get("/api/v1/api-keys").add_header("cookie", session_cookie(&member)).await;
        response.assert_status_forbidden();
        let error: Value = response.json();
        assert_eq!(error["error"], "Missing required permission: apikeys:read");

        let response = server.get("/api/v1/api-keys").add_header("cookie", session_cookie(&admin)).await;
        response.assert_status_ok();
        let keys: Vec<ApiKeyInfoResponse> = response.json();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "mine");
        assert_eq!(keys[0].permissions, Some(json!(["quizzes:read"])));
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_api_key() {
        let (server, store) = create_test_app();
        store.insert_user(test_user("root", Some(ADMIN)));
        store.insert_user(test_user("alice", None));
        let (record, secret) = store.insert_key("alice", "ci", Some(r#"["quizzes:read"]"#), None);
        let admin = store.create_session("root", chrono::Duration::hours(1));
        let member = store.create_session("alice", chrono::Duration::hours(1));

        let response = server
            .delete(&format!("/api/v1/api-keys/{}", record.id))
            .add_header("cookie", session_cookie(&member))
            .await;
        response.assert_status_bad_request();
        let error: Value = response.json();
        assert_eq!(error["error"], "Only admins can delete API keys");

        let response = server
            .delete(&format!("/api/v1/api-keys/{}", record.id))
            .add_header("cookie", session_cookie(&admin))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({"success": true}));

        // Deleted keys no longer authenticate
        server
            .get("/api/v1/auth/context")
            .add_header("x-api-key", secret)
            .await
            .assert_status_unauthorized();

        let response = server
            .delete(&format!("/api/v1/api-keys/{}", record.id))
            .add_header("cookie", session_cookie(&admin))
            .await;
        response.assert_status_not_found();
        let error: Value = response.json();
        assert_eq!(error["error"], "API key not found");
    }
}
