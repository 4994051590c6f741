//! HTTP layer: router assembly, shared app context, auth/permission
//! middleware, range-capable streaming, and static client serving.
//!
//! Router built exactly the way the teacher builds its own
//! (`Router::new().route(...).layer(...).with_state(ctx)` in
//! `server/src/main.rs`), generalized with an auth + permission middleware
//! pair sitting between `TraceLayer` and the handlers.

pub mod handlers;
pub mod middleware;
pub mod static_files;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::metadata::MetadataLookup;
use crate::store::Store;

pub struct AppContext {
    pub store: Store,
    pub config: Config,
    pub metadata_lookup: Box<dyn MetadataLookup>,
}

pub type SharedContext = Arc<AppContext>;

/// Ordinary handlers get a fixed wall-clock deadline (spec §5). Streaming
/// is excluded from this layer entirely — it carries its own idle-timeout
/// in `stream::serve_file` instead, since a fixed cap would kill a healthy
/// multi-minute download of a large file.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_router(ctx: SharedContext, static_assets_dir: Option<&std::path::Path>) -> Router {
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/settings", get(handlers::auth::settings));

    let streaming = Router::new()
        .route("/books/:id/stream", get(handlers::books::stream))
        .layer(axum::middleware::from_fn_with_state(ctx.clone(), middleware::require_auth));

    let protected = Router::new()
        .route("/profile", get(handlers::profile::get))
        .route("/books", get(handlers::books::list))
        .route("/books/:id", get(handlers::books::get))
        .route("/books/authors", get(handlers::authors::list))
        .route("/books/authors/:id", get(handlers::authors::get))
        .route("/books/by-tag/:tag_name", get(handlers::books::by_tag))
        .route(
            "/books/:id/archive",
            post(handlers::books::archive).delete(handlers::books::unarchive),
        )
        .route("/books/archive/validate", post(handlers::books::validate_archive))
        .route(
            "/books/:id/tags",
            post(handlers::books::add_tag),
        )
        .route("/books/:id/tags/:tag_name", delete(handlers::books::remove_tag))
        .route("/books/:id/refresh-metadata", post(handlers::books::refresh_metadata))
        .route("/tags", get(handlers::tags::list))
        .route("/tags/categories/:category", get(handlers::tags::by_category))
        .route("/tags/:id/preference", put(handlers::tags::set_preference))
        .route(
            "/books/:id/progress",
            get(handlers::progress::get).put(handlers::progress::update).delete(handlers::progress::reset),
        )
        .route("/books/:id/progress/start", post(handlers::progress::start))
        .route("/books/:id/progress/complete", post(handlers::progress::complete))
        .route("/reading/progress", get(handlers::reading::all))
        .route("/reading/recent", get(handlers::reading::recent))
        .route("/reading/currently-reading", get(handlers::reading::currently_reading))
        .route("/reading/completed", get(handlers::reading::completed))
        .route("/reading/stats", get(handlers::reading::stats))
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/users/:id/deactivate", post(handlers::admin::deactivate_user))
        .route("/admin/roles", get(handlers::admin::list_roles).post(handlers::admin::create_role))
        .route(
            "/admin/roles/:id",
            put(handlers::admin::update_role_permissions).delete(handlers::admin::delete_role),
        )
        .route("/admin/permissions", get(handlers::admin::list_permissions))
        .route("/admin/invitations", post(handlers::admin::create_invitation))
        .route(
            "/admin/auth-settings",
            get(handlers::admin::get_auth_flow).put(handlers::admin::set_auth_flow),
        )
        .layer(axum::middleware::from_fn_with_state(ctx.clone(), middleware::require_auth))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let api = public.merge(protected).merge(streaming);

    let mut app = Router::new().route("/health", get(handlers::health::health)).merge(api);

    app = match static_assets_dir {
        Some(dir) => app.fallback_service(static_files::service(dir)),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .with_state(ctx)
}
