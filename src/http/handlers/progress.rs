use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::http::SharedContext;
use crate::models::AuthUser;
use crate::services::progress;

pub async fn get(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let found = progress::get(&ctx.store, user.user_id, id)?
        .ok_or_else(|| AppError::NotFound("reading progress".into()))?;
    Ok(Json(found))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    current_page: i64,
    total_pages: Option<i64>,
}

pub async fn update(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> AppResult<impl IntoResponse> {
    let updated = progress::update(&ctx.store, user.user_id, id, body.current_page, body.total_pages)?;
    Ok(Json(updated))
}

pub async fn reset(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    progress::reset(&ctx.store, user.user_id, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn start(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::start(&ctx.store, user.user_id, id)?))
}

pub async fn complete(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(progress::complete(&ctx.store, user.user_id, id)?))
}
