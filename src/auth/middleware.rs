use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Query},
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::helpers::{TokenValidationError, extract_token_from_header, validate_token};
use crate::error::Error;
use crate::server::AppState;
use crate::types::Identity;

/// Extractor that requires a valid bearer token for a known user.
///
/// Browsers cannot set headers on a WebSocket upgrade, so a `token` query
/// parameter is accepted when the Authorization header is absent.
pub struct RequireUser(pub Identity);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    UnknownUser,
    Unavailable,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::UnknownUser => (StatusCode::FORBIDDEN, "Token user is not in the directory"),
            AuthError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Identity service unavailable",
            ),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                HeaderValue::from_static("Bearer realm=\"redline\""),
            );
        }

        response
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw_token = extract_raw_token(parts)?;

        let user_id = validate_token(&state.directory, &raw_token).map_err(|e| match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::InternalError => AuthError::InternalError,
        })?;

        let identity = state
            .workspace
            .identify(&user_id)
            .await
            .map_err(|e| match e {
                Error::Unavailable(_) => AuthError::Unavailable,
                Error::AccessDenied(_) | Error::NotFound(_) => AuthError::UnknownUser,
                _ => AuthError::InternalError,
            })?;

        Ok(RequireUser(identity))
    }
}

fn extract_raw_token(parts: &Parts) -> Result<String, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let from_header = extract_token_from_header(auth_header).map_err(|e| match e {
        TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
        _ => AuthError::InvalidToken,
    })?;

    if let Some(token) = from_header {
        return Ok(token);
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|q| q.0.token)
        .ok_or(AuthError::MissingAuth)
}
