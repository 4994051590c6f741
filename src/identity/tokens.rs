//! Stateless HS256 session tokens. Logout is client-side; there is no
//! server-side revocation list (explicit non-goal, spec §4.8).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const ISSUER: &str = "stackhouse";
const AUDIENCE: &str = "stackhouse-clients";
const EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

pub fn issue(secret: &[u8], user_id: i64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(EXPIRY_HOURS)).timestamp(),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

pub fn verify(secret: &[u8], token: &str) -> AppResult<i64> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| AppError::Authentication(format!("invalid session token: {e}")))?;

    data.claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Authentication("malformed subject claim".into()))
}
