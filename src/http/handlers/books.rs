use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::http::middleware::require_permission;
use crate::http::{stream, SharedContext};
use crate::indexer;
use crate::models::{AuthUser, BookFilter};
use crate::services::{books, tags};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default, rename = "includeGenres")]
    include_genres: String,
    #[serde(default, rename = "excludeGenres")]
    exclude_genres: String,
    #[serde(default, rename = "includeTags")]
    include_tags: String,
    #[serde(default, rename = "excludeTags")]
    exclude_tags: String,
    search: Option<String>,
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

pub async fn list(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = BookFilter {
        include_genres: split_tags(&q.include_genres),
        exclude_genres: split_tags(&q.exclude_genres),
        include_tags: split_tags(&q.include_tags),
        exclude_tags: split_tags(&q.exclude_tags),
        search: q.search,
    };
    let items = books::list(&ctx.store, &user, &filter)?;
    Ok(Json(items))
}

pub async fn get(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(books::get(&ctx.store, &user, id)?))
}

pub async fn by_tag(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(tag_name): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(books::by_tag(&ctx.store, &user, &tag_name)?))
}

pub async fn stream(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let book = books::get(&ctx.store, &user, id)?;
    let path = books::resolve_stream_path(&ctx.store, &user, id, &ctx.config.library_directories)?;
    Ok(stream::serve_file(&path, &headers, &book.file_format).await)
}

#[derive(Debug, Deserialize)]
pub struct TagBody {
    name: String,
}

pub async fn add_tag(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<TagBody>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "books.write")?;
    tags::add_tag_to_book(&ctx.store, id, &body.name)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn remove_tag(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path((id, tag_name)): Path<(i64, String)>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "books.write")?;
    tags::remove_tag_from_book(&ctx.store, id, &tag_name)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn archive(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<ArchiveBody>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "books.write")?;
    books::archive(&ctx.store, id, &body.reason)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ArchiveBody {
    reason: String,
}

pub async fn unarchive(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "books.write")?;
    books::unarchive(&ctx.store, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn validate_archive(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "books.manage")?;
    let retention = ctx.config.archive_retention;
    let stats =
        tokio::task::block_in_place(|| indexer::reconcile::run(&ctx.store, retention))?;
    Ok(Json(stats))
}

pub async fn refresh_metadata(
    State(ctx): State<SharedContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_permission(&ctx, &user, "books.manage")?;
    books::refresh_metadata(&ctx.store, id, ctx.metadata_lookup.as_ref()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
