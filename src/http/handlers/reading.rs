use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::http::SharedContext;
use crate::models::AuthUser;
use crate::services::progress;

pub async fn all(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::all(&ctx.store, user.user_id)?))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn recent(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<RecentQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::recent(&ctx.store, user.user_id, q.limit)?))
}

pub async fn currently_reading(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::currently_reading(&ctx.store, user.user_id)?))
}

pub async fn completed(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::completed(&ctx.store, user.user_id)?))
}

pub async fn stats(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::stats(&ctx.store, user.user_id)?))
}
