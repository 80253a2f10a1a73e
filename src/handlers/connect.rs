//! # OAuth Connect Handlers
//!
//! Handlers for starting an OAuth flow and completing it from the vendor
//! callback.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{UserExtension, UserHeader};
use crate::error::ApiError;
use crate::models::calendar_connection::ConnectionInfo;
use crate::server::AppState;
use crate::service::OAuthUrlGrant;

/// Request body for starting an OAuth flow
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ConnectRequest {
    /// Provider to connect ("google" or "microsoft")
    #[schema(example = "google")]
    pub provider: String,
    /// Where the client wants to land after the flow; a custom (non-HTTP)
    /// scheme marks the flow as mobile
    #[schema(example = "https://app.example.com/settings")]
    pub redirect_url: Option<String>,
}

/// Request body for completing an OAuth flow
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CallbackRequest {
    /// Provider the callback belongs to
    #[schema(example = "google")]
    pub provider: String,
    /// Authorization code handed back by the vendor
    pub code: String,
    /// State token round-tripped through the vendor, when present
    pub state: Option<String>,
}

/// Starts an OAuth flow and returns the vendor authorize URL
#[utoipa::path(
    post,
    path = "/calendar/connect",
    security(("bearer_auth" = [])),
    params(UserHeader),
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "Authorize URL issued", body = OAuthUrlGrant),
        (status = 400, description = "Unknown provider", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "calendar"
)]
pub async fn connect(
    State(state): State<AppState>,
    UserExtension(user): UserExtension,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<OAuthUrlGrant>, ApiError> {
    let grant = state
        .service
        .get_oauth_url(&user.0, &request.provider, request.redirect_url.as_deref())
        .await?;

    Ok(Json(grant))
}

/// Completes an OAuth flow from the vendor callback
#[utoipa::path(
    post,
    path = "/calendar/callback",
    security(("bearer_auth" = [])),
    params(UserHeader),
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Connection established", body = ConnectionInfo),
        (status = 400, description = "Invalid state or provider", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 502, description = "Vendor rejected the exchange", body = ApiError)
    ),
    tag = "calendar"
)]
pub async fn callback(
    State(state): State<AppState>,
    UserExtension(user): UserExtension,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<ConnectionInfo>, ApiError> {
    let connection = state
        .service
        .handle_oauth_callback(
            &user.0,
            &request.provider,
            &request.code,
            request.state.as_deref(),
        )
        .await?;

    Ok(Json(connection))
}
