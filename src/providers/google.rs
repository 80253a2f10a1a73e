//! Google Calendar adapter
//!
//! OAuth flows against accounts.google.com / oauth2.googleapis.com and data
//! access against the Calendar v3 API. Only read scopes are requested;
//! `access_type=offline` plus `prompt=consent` keeps refresh tokens coming on
//! re-connect.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use url::Url;

use super::trait_::{
    AccessRole, AccountInfo, Attendee, CalendarEvent, CalendarInfo, CalendarProvider, EventStatus,
    ProviderError, ProviderKind, ResponseStatus, TokenSet,
};

const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

const SCOPES: &str = "https://www.googleapis.com/auth/calendar.readonly \
     https://www.googleapis.com/auth/userinfo.email \
     https://www.googleapis.com/auth/userinfo.profile";

/// Google Calendar vendor adapter
#[derive(Debug, Clone)]
pub struct GoogleCalendarProvider {
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    api_base: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl GoogleCalendarProvider {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        Self {
            client_id,
            client_secret,
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Overrides the vendor endpoints, for configuration and tests.
    pub fn with_endpoints(
        mut self,
        authorize_url: String,
        token_url: String,
        api_base: String,
    ) -> Self {
        self.authorize_url = authorize_url;
        self.token_url = token_url;
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenSet, ProviderError> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::Google, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ProviderError::upstream_auth(
                ProviderKind::Google,
                status.as_u16(),
                body,
            ));
        }

        let tokens: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(ProviderKind::Google, e.to_string()))?;

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::Google, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::transport(
                ProviderKind::Google,
                Some(status.as_u16()),
                body,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(ProviderKind::Google, e.to_string()))
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ProviderError::malformed(ProviderKind::Google, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::malformed(ProviderKind::Google, "api base cannot be a base".into())
            })?
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn build_authorize_url(&self, callback_url: &str, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| ProviderError::malformed(ProviderKind::Google, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", callback_url)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        callback_url: &str,
    ) -> Result<TokenSet, ProviderError> {
        self.request_tokens(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", callback_url),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        self.request_tokens(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn fetch_account_info(&self, access_token: &str) -> Result<AccountInfo, ProviderError> {
        let url = self.api_url(&["oauth2", "v2", "userinfo"])?;
        let info: GoogleUserInfo = self.get_json(url, access_token).await?;

        Ok(AccountInfo {
            email: info.email,
            name: info.name,
        })
    }

    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, ProviderError> {
        let url = self.api_url(&["calendar", "v3", "users", "me", "calendarList"])?;
        let list: GoogleCalendarList = self.get_json(url, access_token).await?;

        Ok(list.items.into_iter().map(CalendarInfo::from).collect())
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, ProviderError> {
        let mut url = self.api_url(&["calendar", "v3", "calendars", calendar_id, "events"])?;
        url.query_pairs_mut()
            .append_pair("timeMin", &start.to_rfc3339())
            .append_pair("timeMax", &end.to_rfc3339())
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let list: GoogleEventList = self.get_json(url, access_token).await?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|item| normalize_event(item, calendar_id))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarList {
    #[serde(default)]
    items: Vec<GoogleCalendarListEntry>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarListEntry {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    primary: bool,
    #[serde(rename = "accessRole")]
    access_role: Option<String>,
    #[serde(rename = "backgroundColor")]
    background_color: Option<String>,
}

impl From<GoogleCalendarListEntry> for CalendarInfo {
    fn from(entry: GoogleCalendarListEntry) -> Self {
        let name = entry.summary.unwrap_or_else(|| entry.id.clone());
        Self {
            id: entry.id,
            name,
            description: entry.description,
            is_primary: entry.primary,
            access_role: map_access_role(entry.access_role.as_deref()),
            background_color: entry.background_color,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleEventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
    organizer: Option<GoogleOrganizer>,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
}

/// Google encodes all-day events with a `date` field and timed events with a
/// `dateTime` field.
#[derive(Debug, Deserialize)]
struct GoogleEventTime {
    date: Option<String>,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleOrganizer {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAttendee {
    email: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "responseStatus")]
    response_status: Option<String>,
}

fn map_access_role(role: Option<&str>) -> AccessRole {
    match role {
        Some("owner") => AccessRole::Owner,
        Some("writer") => AccessRole::Writer,
        Some("freeBusyReader") => AccessRole::FreeBusyReader,
        _ => AccessRole::Reader,
    }
}

fn map_event_status(status: Option<&str>) -> EventStatus {
    match status {
        Some("tentative") => EventStatus::Tentative,
        Some("cancelled") => EventStatus::Cancelled,
        _ => EventStatus::Confirmed,
    }
}

fn map_attendee_response(status: Option<&str>) -> ResponseStatus {
    match status {
        Some("accepted") => ResponseStatus::Accepted,
        Some("declined") => ResponseStatus::Declined,
        Some("tentative") => ResponseStatus::Tentative,
        _ => ResponseStatus::NeedsAction,
    }
}

fn parse_event_time(time: &GoogleEventTime) -> Option<(DateTime<Utc>, bool)> {
    if let Some(date_time) = &time.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .ok()
            .map(|dt| (dt.with_timezone(&Utc), false));
    }

    let date = time.date.as_deref()?;
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let midnight = naive.and_hms_opt(0, 0, 0)?;
    Some((DateTime::from_naive_utc_and_offset(midnight, Utc), true))
}

fn normalize_event(event: GoogleEvent, calendar_id: &str) -> Option<CalendarEvent> {
    let (start_time, is_all_day) = event.start.as_ref().and_then(parse_event_time)?;
    let (end_time, _) = event.end.as_ref().and_then(parse_event_time)?;

    let attendees = event
        .attendees
        .into_iter()
        .filter_map(|attendee| {
            Some(Attendee {
                email: attendee.email?,
                name: attendee.display_name,
                response_status: map_attendee_response(attendee.response_status.as_deref()),
            })
        })
        .collect();

    Some(CalendarEvent {
        id: event.id,
        calendar_id: calendar_id.to_string(),
        title: event.summary.unwrap_or_default(),
        description: event.description,
        location: event.location,
        start_time,
        end_time,
        is_all_day,
        status: map_event_status(event.status.as_deref()),
        organizer: event.organizer.and_then(|o| o.email),
        attendees,
        html_link: event.html_link,
    })
}
