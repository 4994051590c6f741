use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::http::middleware::require_permission;
use crate::http::SharedContext;
use crate::identity::invitations;
use crate::models::{AuthFlow, AuthUser};
use crate::services::admin;

pub async fn list_users(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    Ok(Json(admin::list_users(&ctx.store)?))
}

pub async fn deactivate_user(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    admin::deactivate_user(&ctx.store, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct InvitationBody {
    email: String,
    #[serde(default = "default_ttl_hours")]
    ttl_hours: i64,
}

fn default_ttl_hours() -> i64 {
    72
}

pub async fn create_invitation(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<InvitationBody>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    let token =
        invitations::create(&ctx.store, &ctx.config.jwt_secret, &body.email, body.ttl_hours)?;
    Ok(Json(json!({ "token": token })))
}

#[derive(Debug, Deserialize)]
pub struct AuthSettingsBody {
    auth_flow: AuthFlow,
}

pub async fn get_auth_flow(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    let flow = admin::auth_flow(&ctx.store)?;
    Ok(Json(json!({ "auth_flow": flow.as_str() })))
}

pub async fn set_auth_flow(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<AuthSettingsBody>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    admin::set_auth_flow(&ctx.store, body.auth_flow)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn list_roles(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    Ok(Json(admin::list_roles(&ctx.store)?))
}

pub async fn list_permissions(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    Ok(Json(admin::list_permissions(&ctx.store)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleBody {
    name: String,
    #[serde(default)]
    description: String,
}

pub async fn create_role(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateRoleBody>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    let id = admin::create_role(&ctx.store, &body.name, &body.description)?;
    Ok((axum::http::StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn delete_role(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    admin::delete_role(&ctx.store, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionsBody {
    permissions: Vec<String>,
}

pub async fn update_role_permissions(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<RolePermissionsBody>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "admin.full")?;
    admin::set_role_permissions(&ctx.store, id, &body.permissions)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
