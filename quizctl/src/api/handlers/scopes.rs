use crate::api::models::scopes::{ScopeCatalogResponse, ScopeInfo};
use crate::auth::scopes::Scope;
use axum::response::Json;

/// List the scope catalog.
#[utoipa::path(
    get,
    path = "/scopes",
    tag = "auth",
    summary = "List scopes",
    description = "The closed set of scopes API keys may be granted, and the baseline held by every signed-in user",
    responses(
        (status = 200, description = "Scope catalog", body = ScopeCatalogResponse),
    )
)]
pub async fn list_scopes() -> Json<ScopeCatalogResponse> {
    Json(ScopeCatalogResponse {
        scopes: Scope::ALL.into_iter().map(ScopeInfo::from).collect(),
        baseline: Scope::BASELINE.to_vec(),
    })
}
