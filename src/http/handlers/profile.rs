use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::http::SharedContext;
use crate::models::AuthUser;
use crate::services::admin;

pub async fn get(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(admin::get_user(&ctx.store, user.user_id)?))
}
