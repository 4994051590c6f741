use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::http::SharedContext;
use crate::models::AuthUser;
use crate::services::authors;

pub async fn list(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(authors::list(&ctx.store, &user)?))
}

pub async fn get(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let found = authors::get(&ctx.store, &user, id)?
        .ok_or_else(|| AppError::NotFound(format!("author {id}")))?;
    Ok(Json(found))
}
