//! HTTP Basic authentication middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use super::{error::ApiError, AppState};
use crate::config::AuthConfig;

const MISSING: &str = "Unauthorized";
const INVALID: &str = "Invalid basic auth";

/// Let the request through when auth is disabled or the credentials match.
pub async fn basic_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = state.auth.as_deref() else {
        return Ok(next.run(request).await);
    };

    let encoded = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .ok_or(ApiError::Unauthorized(MISSING))?;

    match check_credentials(auth, encoded) {
        Ok(()) => Ok(next.run(request).await),
        Err(reason) => {
            warn!("Rejected basic auth: {}", reason);
            Err(ApiError::Unauthorized(INVALID))
        }
    }
}

fn check_credentials(auth: &AuthConfig, encoded: &str) -> Result<(), &'static str> {
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| "malformed base64")?;
    let decoded = String::from_utf8(decoded).map_err(|_| "credentials are not UTF-8")?;
    let (username, password) = decoded.split_once(':').ok_or("missing ':' separator")?;

    if auth.matches(username, password) {
        Ok(())
    } else {
        Err("wrong credentials")
    }
}
