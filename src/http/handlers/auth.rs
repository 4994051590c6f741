use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::http::SharedContext;
use crate::identity::{self, RegisterRequest};
use crate::services::admin;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    username: String,
    email: String,
    password: String,
    display_name: String,
    invitation_token: Option<String>,
}

pub async fn register(
    State(ctx): State<SharedContext>,
    Json(body): Json<RegisterBody>,
) -> AppResult<impl IntoResponse> {
    let user = identity::register(
        &ctx.store,
        &ctx.config,
        RegisterRequest {
            username: body.username,
            email: body.email,
            password: body.password,
            display_name: body.display_name,
            invitation_token: body.invitation_token,
        },
    )?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Public view of the configured auth flow — lets an unauthenticated
/// client know whether registration needs an invitation token before it
/// tries.
pub async fn settings(State(ctx): State<SharedContext>) -> AppResult<impl IntoResponse> {
    let flow = admin::auth_flow(&ctx.store)?;
    Ok(Json(json!({ "auth_flow": flow.as_str() })))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

pub async fn login(
    State(ctx): State<SharedContext>,
    Json(body): Json<LoginBody>,
) -> AppResult<impl IntoResponse> {
    let token = identity::login(&ctx.store, &ctx.config, &body.email, &body.password)?;
    Ok(Json(json!({ "token": token })))
}
