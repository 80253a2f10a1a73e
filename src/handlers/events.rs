//! # Event Handlers
//!
//! Handler for listing events on a connected calendar.

use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{UserExtension, UserHeader};
use crate::error::{ApiError, validation_error};
use crate::providers::CalendarEvent;
use crate::server::AppState;

const DEFAULT_MAX_RESULTS: u32 = 50;
const MAX_MAX_RESULTS: u32 = 100;

/// Request body for listing events
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ListEventsRequest {
    /// Connection to read through
    #[schema(value_type = String)]
    pub connection_id: Uuid,
    /// Calendar to read; defaults to the account's primary calendar
    pub calendar_id: Option<String>,
    /// Window start (inclusive)
    pub start_date: DateTime<Utc>,
    /// Window end (exclusive)
    pub end_date: DateTime<Utc>,
    /// Maximum events to return (default 50, max 100)
    pub max_results: Option<u32>,
}

/// Response wrapper for event listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventsResponse {
    /// Normalized events in the requested window
    pub events: Vec<CalendarEvent>,
}

/// Lists events on a connected calendar
#[utoipa::path(
    post,
    path = "/calendar/events",
    security(("bearer_auth" = [])),
    params(UserHeader),
    request_body = ListEventsRequest,
    responses(
        (status = 200, description = "Events in the window", body = EventsResponse),
        (status = 400, description = "Validation error or reconnect required", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Connection not found or inactive", body = ApiError),
        (status = 502, description = "Vendor error", body = ApiError)
    ),
    tag = "calendar"
)]
pub async fn list_events(
    State(state): State<AppState>,
    UserExtension(user): UserExtension,
    Json(request): Json<ListEventsRequest>,
) -> Result<Json<EventsResponse>, ApiError> {
    let max_results = request.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    if !(1..=MAX_MAX_RESULTS).contains(&max_results) {
        return Err(validation_error(
            "Invalid max_results",
            serde_json::json!({ "max_results": "must be between 1 and 100" }),
        ));
    }

    let events = state
        .service
        .list_events(
            &user.0,
            &request.connection_id,
            request.calendar_id.as_deref(),
            request.start_date,
            request.end_date,
            max_results,
        )
        .await?;

    Ok(Json(EventsResponse { events }))
}
