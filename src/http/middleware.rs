//! Auth middleware: extracts and validates the bearer JWT, attaching
//! [`AuthUser`] as a request extension for downstream handlers and the
//! permission checks they perform.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::http::SharedContext;
use crate::identity::tokens;
use crate::models::AuthUser;
use crate::services::visibility;

pub async fn require_auth(
    State(ctx): State<SharedContext>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Authentication("missing bearer token".into()))?;

    let user_id = tokens::verify(&ctx.config.jwt_secret, token)?;
    let roles = roles_for(&ctx, user_id)?;

    request.extensions_mut().insert(AuthUser { user_id, roles });
    Ok(next.run(request).await)
}

fn roles_for(ctx: &SharedContext, user_id: i64) -> Result<Vec<String>, AppError> {
    ctx.store.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id WHERE ur.user_id = ?1",
        )?;
        let names = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    })
}

/// Fails the request with `403` unless `user` holds `permission`. Used by
/// handlers that bypass the tag-visibility filter (admin endpoints,
/// archive/unarchive) — spec §4.7's "administrative endpoints ... require a
/// dedicated permission" rule.
pub fn require_permission(
    ctx: &SharedContext,
    user: &AuthUser,
    permission: &str,
) -> Result<(), AppError> {
    let permissions = visibility::effective_permissions(&ctx.store, user.user_id)?;
    if permissions.contains(permission) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!("requires permission '{permission}'")))
    }
}
