use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::http::SharedContext;
use crate::models::{AuthUser, TagPreferenceState};
use crate::services::tags;

pub async fn list(State(ctx): State<SharedContext>) -> AppResult<impl IntoResponse> {
    Ok(Json(tags::list_categories(&ctx.store)?))
}

pub async fn by_category(
    State(ctx): State<SharedContext>,
    Path(category): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(tags::list_by_category(&ctx.store, &category)?))
}

#[derive(Debug, Deserialize)]
pub struct PreferenceBody {
    state: TagPreferenceState,
}

pub async fn set_preference(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(tag_id): Path<i64>,
    Json(body): Json<PreferenceBody>,
) -> AppResult<impl IntoResponse> {
    tags::set_user_preference(&ctx.store, user.user_id, tag_id, body.state)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
