//! Vendor adapter tests against a wiremock server.
//!
//! Covers token exchange and refresh wire formats, error classification, and
//! response normalization for both real adapters.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calendar_api::providers::{
    AccessRole, CalendarProvider, EventStatus, GoogleCalendarProvider, MicrosoftCalendarProvider,
    ProviderError, ResponseStatus,
};

fn google(server: &MockServer) -> GoogleCalendarProvider {
    GoogleCalendarProvider::new(
        "google-client".to_string(),
        "google-secret".to_string(),
        Duration::from_secs(5),
    )
    .with_endpoints(
        format!("{}/o/oauth2/v2/auth", server.uri()),
        format!("{}/token", server.uri()),
        server.uri(),
    )
}

fn microsoft(server: &MockServer) -> MicrosoftCalendarProvider {
    MicrosoftCalendarProvider::new(
        "ms-client".to_string(),
        "ms-secret".to_string(),
        Duration::from_secs(5),
    )
    .with_endpoints(
        format!("{}/authorize", server.uri()),
        format!("{}/token", server.uri()),
        server.uri(),
    )
}

#[tokio::test]
async fn google_code_exchange_posts_form_and_parses_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("client_id=google-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "refresh_token": "1//refresh",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = google(&server)
        .exchange_code("the-code", "https://api.example.com/calendar/callback")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "ya29.fresh");
    assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
    assert!(tokens.expires_at.unwrap() > Utc::now());
}

#[tokio::test]
async fn google_rejected_refresh_is_upstream_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let error = google(&server).refresh_token("dead-token").await.unwrap_err();

    match error {
        ProviderError::UpstreamAuth {
            provider,
            status,
            body,
        } => {
            assert_eq!(provider, "google");
            assert_eq!(status, 400);
            assert!(body.unwrap().contains("invalid_grant"));
        }
        other => panic!("expected UpstreamAuth, got {:?}", other),
    }
}

#[tokio::test]
async fn google_calendar_list_is_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendar/v3/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "primary-cal@group.calendar.google.com",
                    "summary": "Work",
                    "description": "Team calendar",
                    "primary": true,
                    "accessRole": "owner",
                    "backgroundColor": "#9fe1e7"
                },
                {
                    "id": "holidays@group.v.calendar.google.com",
                    "summary": "Holidays",
                    "accessRole": "somethingNew"
                }
            ]
        })))
        .mount(&server)
        .await;

    let calendars = google(&server).list_calendars("token").await.unwrap();

    assert_eq!(calendars.len(), 2);
    assert!(calendars[0].is_primary);
    assert_eq!(calendars[0].access_role, AccessRole::Owner);
    assert_eq!(calendars[0].background_color.as_deref(), Some("#9fe1e7"));
    // Unknown vendor role falls back to reader.
    assert_eq!(calendars[1].access_role, AccessRole::Reader);
}

#[tokio::test]
async fn google_events_request_carries_window_and_ordering() {
    let server = MockServer::start().await;
    let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 7, 8, 0, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("maxResults", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "evt-1",
                    "status": "tentative",
                    "summary": "Planning",
                    "start": {"dateTime": "2026-07-02T10:00:00+02:00"},
                    "end": {"dateTime": "2026-07-02T11:00:00+02:00"},
                    "attendees": [
                        {"email": "a@example.com", "responseStatus": "declined"}
                    ]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = google(&server)
        .list_events("token", "primary", start, end, 25)
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, EventStatus::Tentative);
    assert_eq!(events[0].calendar_id, "primary");
    assert_eq!(
        events[0].attendees[0].response_status,
        ResponseStatus::Declined
    );
}

#[tokio::test]
async fn google_unauthorized_api_call_is_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendar/v3/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&server)
        .await;

    let error = google(&server).list_calendars("bad").await.unwrap_err();
    assert!(matches!(
        error,
        ProviderError::Transport {
            status: Some(401),
            ..
        }
    ));
}

#[tokio::test]
async fn google_server_error_is_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendar/v3/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let error = google(&server).list_calendars("token").await.unwrap_err();
    assert!(matches!(
        error,
        ProviderError::Transport {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn microsoft_token_exchange_includes_scope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "graph-access",
            "refresh_token": "graph-refresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = microsoft(&server)
        .exchange_code("ms-code", "https://api.example.com/calendar/callback")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "graph-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("graph-refresh"));
}

#[tokio::test]
async fn microsoft_account_info_falls_back_to_user_principal_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "displayName": "Pat Example",
            "mail": null,
            "userPrincipalName": "pat@contoso.com"
        })))
        .mount(&server)
        .await;

    let account = microsoft(&server).fetch_account_info("token").await.unwrap();
    assert_eq!(account.email, "pat@contoso.com");
    assert_eq!(account.name.as_deref(), Some("Pat Example"));
}

#[tokio::test]
async fn microsoft_primary_uses_default_calendar_view() {
    let server = MockServer::start().await;
    let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 7, 8, 0, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path("/me/calendarView"))
        .and(query_param("$top", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "id": "graph-evt-1",
                    "subject": "Review",
                    "start": {"dateTime": "2026-07-03T09:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2026-07-03T10:00:00.0000000", "timeZone": "UTC"},
                    "isAllDay": false,
                    "showAs": "free"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = microsoft(&server)
        .list_events("token", "primary", start, end, 10)
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    // Graph "free" normalizes to cancelled.
    assert_eq!(events[0].status, EventStatus::Cancelled);
    assert_eq!(events[0].start_time.to_rfc3339(), "2026-07-03T09:00:00+00:00");
}

#[tokio::test]
async fn microsoft_named_calendar_scopes_the_view() {
    let server = MockServer::start().await;
    let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 7, 8, 0, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path("/me/calendars/team-cal-id/calendarView"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let events = microsoft(&server)
        .list_events("token", "team-cal-id", start, end, 50)
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn microsoft_calendar_listing_maps_can_edit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "id": "cal-1",
                    "name": "Calendar",
                    "isDefaultCalendar": true,
                    "canEdit": true,
                    "hexColor": "#0078d4"
                },
                {
                    "id": "cal-2",
                    "name": "Read only",
                    "canEdit": false
                }
            ]
        })))
        .mount(&server)
        .await;

    let calendars = microsoft(&server).list_calendars("token").await.unwrap();

    assert_eq!(calendars.len(), 2);
    assert_eq!(calendars[0].access_role, AccessRole::Writer);
    assert!(calendars[0].is_primary);
    assert_eq!(calendars[1].access_role, AccessRole::Reader);
}
