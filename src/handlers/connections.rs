//! # Connection Handlers
//!
//! Handlers for listing, inspecting, and removing calendar connections.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{UserExtension, UserHeader};
use crate::error::ApiError;
use crate::models::calendar_connection::ConnectionInfo;
use crate::providers::CalendarInfo;
use crate::server::AppState;

/// Response wrapper for connection listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionsResponse {
    /// The caller's calendar connections
    pub connections: Vec<ConnectionInfo>,
}

/// Response for a connection removal
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisconnectResponse {
    /// Always true; removal either succeeds or errors
    pub success: bool,
}

/// Response wrapper for calendar listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CalendarsResponse {
    /// Calendars visible to the connected account
    pub calendars: Vec<CalendarInfo>,
}

/// Lists the caller's calendar connections
#[utoipa::path(
    get,
    path = "/calendar/connections",
    security(("bearer_auth" = [])),
    params(UserHeader),
    responses(
        (status = 200, description = "List of connections", body = ConnectionsResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "calendar"
)]
pub async fn list_connections(
    State(state): State<AppState>,
    UserExtension(user): UserExtension,
) -> Result<Json<ConnectionsResponse>, ApiError> {
    let connections = state.service.list_connections(&user.0).await?;
    Ok(Json(ConnectionsResponse { connections }))
}

/// Removes a calendar connection
#[utoipa::path(
    delete,
    path = "/calendar/connections/{id}",
    security(("bearer_auth" = [])),
    params(
        UserHeader,
        ("id" = Uuid, Path, description = "Connection identifier")
    ),
    responses(
        (status = 200, description = "Connection removed", body = DisconnectResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Connection not found", body = ApiError)
    ),
    tag = "calendar"
)]
pub async fn disconnect(
    State(state): State<AppState>,
    UserExtension(user): UserExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    state.service.disconnect(&user.0, &id).await?;
    Ok(Json(DisconnectResponse { success: true }))
}

/// Lists the calendars behind a connection
#[utoipa::path(
    get,
    path = "/calendar/connections/{id}/calendars",
    security(("bearer_auth" = [])),
    params(
        UserHeader,
        ("id" = Uuid, Path, description = "Connection identifier")
    ),
    responses(
        (status = 200, description = "Calendars for the connection", body = CalendarsResponse),
        (status = 400, description = "Connection expired, reconnect required", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Connection not found or inactive", body = ApiError),
        (status = 502, description = "Vendor error", body = ApiError)
    ),
    tag = "calendar"
)]
pub async fn list_calendars(
    State(state): State<AppState>,
    UserExtension(user): UserExtension,
    Path(id): Path<Uuid>,
) -> Result<Json<CalendarsResponse>, ApiError> {
    let calendars = state.service.list_calendars(&user.0, &id).await?;
    Ok(Json(CalendarsResponse { calendars }))
}
