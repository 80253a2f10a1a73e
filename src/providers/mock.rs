//! Deterministic mock adapter
//!
//! Selected through `CALAPI_USE_MOCK_PROVIDERS` for local development and
//! tests. Every operation is pure: no network, and identical inputs always
//! produce identical outputs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use url::Url;

use super::trait_::{
    AccessRole, AccountInfo, Attendee, CalendarEvent, CalendarInfo, CalendarProvider, EventStatus,
    ProviderError, ProviderKind, ResponseStatus, TokenSet,
};

const REFRESH_TOKEN: &str = "mock-refresh-token";

/// Mock vendor adapter impersonating one [`ProviderKind`].
#[derive(Debug, Clone)]
pub struct MockCalendarProvider {
    kind: ProviderKind,
}

impl MockCalendarProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl CalendarProvider for MockCalendarProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn build_authorize_url(&self, callback_url: &str, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse("https://mock.invalid/oauth/authorize")
            .map_err(|e| ProviderError::malformed(self.kind, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", self.kind.as_str())
            .append_pair("redirect_uri", callback_url)
            .append_pair("response_type", "code")
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        _callback_url: &str,
    ) -> Result<TokenSet, ProviderError> {
        if code.is_empty() {
            return Err(ProviderError::upstream_auth(
                self.kind,
                400,
                Some("invalid_grant: empty code".to_string()),
            ));
        }

        Ok(TokenSet {
            access_token: format!("mock-access-{}", code),
            refresh_token: Some(REFRESH_TOKEN.to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        if refresh_token != REFRESH_TOKEN {
            return Err(ProviderError::upstream_auth(
                self.kind,
                400,
                Some("invalid_grant: unknown refresh token".to_string()),
            ));
        }

        Ok(TokenSet {
            access_token: "mock-access-refreshed".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn fetch_account_info(&self, _access_token: &str) -> Result<AccountInfo, ProviderError> {
        Ok(AccountInfo {
            email: format!("mock.user@{}.example.com", self.kind),
            name: Some("Mock User".to_string()),
        })
    }

    async fn list_calendars(
        &self,
        _access_token: &str,
    ) -> Result<Vec<CalendarInfo>, ProviderError> {
        Ok(vec![
            CalendarInfo {
                id: "primary".to_string(),
                name: "Mock Calendar".to_string(),
                description: Some("Default mock calendar".to_string()),
                is_primary: true,
                access_role: AccessRole::Owner,
                background_color: Some("#4285f4".to_string()),
            },
            CalendarInfo {
                id: "mock-shared".to_string(),
                name: "Shared Mock Calendar".to_string(),
                description: None,
                is_primary: false,
                access_role: AccessRole::Reader,
                background_color: None,
            },
        ])
    }

    async fn list_events(
        &self,
        _access_token: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, ProviderError> {
        let first_start = start + Duration::hours(1);
        let events = vec![
            CalendarEvent {
                id: "mock-event-1".to_string(),
                calendar_id: calendar_id.to_string(),
                title: "Mock standup".to_string(),
                description: Some("Daily sync".to_string()),
                location: Some("Mock Room".to_string()),
                start_time: first_start,
                end_time: first_start + Duration::minutes(30),
                is_all_day: false,
                status: EventStatus::Confirmed,
                organizer: Some("organizer@example.com".to_string()),
                attendees: vec![Attendee {
                    email: "attendee@example.com".to_string(),
                    name: Some("Attendee".to_string()),
                    response_status: ResponseStatus::Accepted,
                }],
                html_link: Some("https://mock.invalid/events/mock-event-1".to_string()),
            },
            CalendarEvent {
                id: "mock-event-2".to_string(),
                calendar_id: calendar_id.to_string(),
                title: "Mock all-day".to_string(),
                description: None,
                location: None,
                start_time: start,
                end_time: start + Duration::days(1),
                is_all_day: true,
                status: EventStatus::Tentative,
                organizer: None,
                attendees: Vec::new(),
                html_link: None,
            },
        ];

        Ok(events
            .into_iter()
            .filter(|event| event.start_time < end)
            .take(max_results as usize)
            .collect())
    }
}
