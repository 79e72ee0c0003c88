use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::AppState;

/// Authenticated operator's id, stored in request extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Claims expected inside the JWT for authenticated operators.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the operator's UUID as a string.
    pub sub: String,
    pub exp: usize,
}

/// Signs an HS256 token for `operator_id` valid for `ttl`.
pub fn issue_token(secret: &str, operator_id: Uuid, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + ttl).timestamp().max(0) as usize;
    let claims = Claims {
        sub: operator_id.to_string(),
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Validates a token and returns the operator it was issued to.
pub fn verify_token(secret: &str, token: &str) -> Option<CurrentUser> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let claims = decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map_err(|e| warn!("Rejected token: {}", e))
        .ok()?
        .claims;

    Uuid::parse_str(&claims.sub).ok().map(CurrentUser)
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the request is forwarded with a [`CurrentUser`] extension;
/// on failure a `401` is returned.
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = verify_token(&state.jwt_secret, token).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
