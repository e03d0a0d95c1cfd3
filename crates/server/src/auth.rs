//! Shared-secret gates, applied as middleware to the admin and vote routes.

use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;

pub const ADMIN_SECRET_HEADER: &str = "X-Admin-Secret";
pub const VOTE_PASSWORD_HEADER: &str = "X-Vote-Password";

#[derive(Debug, Default, Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Admin routes accept the secret as `?secret=` or in the admin header.
pub async fn require_admin_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.config.admin_secret.as_str();

    let from_query = Query::<SecretQuery>::try_from_uri(req.uri())
        .map(|Query(q)| q)
        .unwrap_or_default()
        .secret;
    let from_header = header(req.headers(), ADMIN_SECRET_HEADER);

    if from_query.as_deref() == Some(expected) || from_header == Some(expected) {
        return Ok(next.run(req).await);
    }

    tracing::warn!(path = %req.uri().path(), "admin request with missing or wrong secret");
    Err(AppError::Forbidden)
}

/// Voting requires the vote password header.
pub async fn require_vote_password(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if header(req.headers(), VOTE_PASSWORD_HEADER) == Some(state.config.vote_password.as_str()) {
        return Ok(next.run(req).await);
    }

    tracing::debug!("vote rejected, missing or wrong password");
    Err(AppError::Forbidden)
}
