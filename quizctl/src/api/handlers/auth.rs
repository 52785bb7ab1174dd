use crate::{
    AppState,
    api::models::auth::AuthContextResponse,
    auth::context::AuthorizationContext,
    errors::{ErrorBody, Result},
};
use axum::{extract::State, response::Json};

/// Get the caller's resolved authorization context.
#[utoipa::path(
    get,
    path = "/auth/context",
    tag = "auth",
    summary = "Get authorization context",
    description = "Who the caller is, which scopes they hold, and whether they authenticated with an API key or a session",
    responses(
        (status = 200, description = "Resolved context", body = AuthContextResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
    ),
    security(
        ("ApiKey" = []),
        ("SessionCookie" = [])
    )
)]
pub async fn get_auth_context(State(state): State<AppState>, ctx: AuthorizationContext) -> Result<Json<AuthContextResponse>> {
    Ok(Json(AuthContextResponse::from_context(&ctx, state.gate.roles())))
}
