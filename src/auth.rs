//! # Authentication
//!
//! Bearer token authentication and user header validation for the calendar
//! API. Every protected route requires a configured bearer token plus an
//! `X-User-Id` header identifying the acting user.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized, unauthorized_with_trace_id, validation_error};
use crate::telemetry::TraceContext;

/// User ID wrapper for type safety
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Extractor for the authenticated user from request extensions
#[derive(Debug, Clone)]
pub struct UserExtension(pub UserId);

/// Authentication middleware that validates bearer tokens and the user header
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers().clone();

    // Extract trace_id from request context for consistent error responses
    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone());

    let token = extract_bearer_token(&headers, trace_id)?;
    validate_token(&config, token)?;

    let user = extract_user_id(&headers)?;
    tracing::debug!(user_id = %user.0, "Authenticated request");

    let mut request = request;
    request.extensions_mut().insert(UserExtension(user));

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap, trace_id: Option<String>) -> Result<&str, ApiError> {
    let reject = |message: &str, trace_id: Option<String>| match trace_id {
        Some(trace_id) => unauthorized_with_trace_id(Some(message), trace_id),
        None => unauthorized(Some(message)),
    };

    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| reject("Missing Authorization header", trace_id.clone()))?
        .to_str()
        .map_err(|_| reject("Invalid Authorization header", trace_id.clone()))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject("Authorization header must use Bearer scheme", trace_id))
}

fn validate_token(config: &AppConfig, token: &str) -> Result<(), ApiError> {
    let is_valid = config
        .api_tokens
        .iter()
        .any(|configured| ConstantTimeEq::ct_eq(token.as_bytes(), configured.as_bytes()).into());

    if is_valid {
        Ok(())
    } else {
        Err(unauthorized(Some("Invalid bearer token")))
    }
}

fn extract_user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let header_value = headers
        .get("X-User-Id")
        .ok_or_else(|| {
            validation_error(
                "Missing required header",
                serde_json::json!({ "X-User-Id": "Required header is missing" }),
            )
        })?
        .to_str()
        .map_err(|_| {
            validation_error(
                "Invalid user header",
                serde_json::json!({ "X-User-Id": "Header must be valid UTF-8" }),
            )
        })?;

    header_value.parse::<Uuid>().map(UserId).map_err(|_| {
        validation_error(
            "Invalid user ID",
            serde_json::json!({ "X-User-Id": "Must be a valid UUID" }),
        )
    })
}

/// OpenAPI header parameter for X-User-Id
#[derive(Debug, Serialize, Deserialize, IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Header)]
pub struct UserHeader {
    /// User identifier (UUID) that scopes the request to a specific user
    #[serde(rename = "X-User-Id")]
    #[param(rename = "X-User-Id", value_type = String)]
    pub user_id: String,
}

impl<S> FromRequestParts<S> for UserExtension
where
    Arc<AppConfig>: FromRef<S>,
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserExtension>()
            .cloned()
            .ok_or_else(|| {
                validation_error(
                    "User context missing",
                    serde_json::json!({ "X-User-Id": "User context not present" }),
                )
            })
    }
}
