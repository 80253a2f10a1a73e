//! Microsoft Outlook adapter
//!
//! OAuth flows against login.microsoftonline.com (common tenant) and data
//! access against Microsoft Graph v1.0. Graph returns event times without a
//! timezone suffix, so parsing falls back through several formats before
//! giving up on an event.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::trait_::{
    AccessRole, AccountInfo, Attendee, CalendarEvent, CalendarInfo, CalendarProvider, EventStatus,
    ProviderError, ProviderKind, ResponseStatus, TokenSet,
};

const DEFAULT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const DEFAULT_API_BASE: &str = "https://graph.microsoft.com/v1.0";

const SCOPES: &str = "Calendars.Read User.Read offline_access";

/// Microsoft Outlook vendor adapter
#[derive(Debug, Clone)]
pub struct MicrosoftCalendarProvider {
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    api_base: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl MicrosoftCalendarProvider {
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
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::Microsoft, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ProviderError::upstream_auth(
                ProviderKind::Microsoft,
                status.as_u16(),
                body,
            ));
        }

        let tokens: GraphTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(ProviderKind::Microsoft, e.to_string()))?;

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
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::Microsoft, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::transport(
                ProviderKind::Microsoft,
                Some(status.as_u16()),
                body,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(ProviderKind::Microsoft, e.to_string()))
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ProviderError::malformed(ProviderKind::Microsoft, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::malformed(
                    ProviderKind::Microsoft,
                    "api base cannot be a base".into(),
                )
            })?
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl CalendarProvider for MicrosoftCalendarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Microsoft
    }

    fn build_authorize_url(&self, callback_url: &str, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| ProviderError::malformed(ProviderKind::Microsoft, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", callback_url)
            .append_pair("response_type", "code")
            .append_pair("response_mode", "query")
            .append_pair("scope", SCOPES)
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
            ("scope", SCOPES),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        self.request_tokens(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", SCOPES),
        ])
        .await
    }

    async fn fetch_account_info(&self, access_token: &str) -> Result<AccountInfo, ProviderError> {
        let url = self.api_url(&["me"])?;
        let me: GraphUser = self.get_json(url, access_token).await?;

        let email = me
            .mail
            .or(me.user_principal_name)
            .ok_or_else(|| {
                ProviderError::malformed(
                    ProviderKind::Microsoft,
                    "account has neither mail nor userPrincipalName".into(),
                )
            })?;

        Ok(AccountInfo {
            email,
            name: me.display_name,
        })
    }

    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, ProviderError> {
        let url = self.api_url(&["me", "calendars"])?;
        let list: GraphCollection<GraphCalendar> = self.get_json(url, access_token).await?;

        Ok(list.value.into_iter().map(CalendarInfo::from).collect())
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, ProviderError> {
        // "primary" maps to the default calendar view; any other ID scopes the
        // view to that calendar.
        let mut url = if calendar_id == self.primary_calendar_id() {
            self.api_url(&["me", "calendarView"])?
        } else {
            self.api_url(&["me", "calendars", calendar_id, "calendarView"])?
        };

        url.query_pairs_mut()
            .append_pair("startDateTime", &start.to_rfc3339())
            .append_pair("endDateTime", &end.to_rfc3339())
            .append_pair("$orderby", "start/dateTime")
            .append_pair("$top", &max_results.to_string());

        let list: GraphCollection<GraphEvent> = self.get_json(url, access_token).await?;

        Ok(list
            .value
            .into_iter()
            .filter_map(|event| normalize_event(event, calendar_id))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct GraphTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GraphUser {
    mail: Option<String>,
    #[serde(rename = "userPrincipalName")]
    user_principal_name: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphCollection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct GraphCalendar {
    id: String,
    name: Option<String>,
    #[serde(rename = "isDefaultCalendar", default)]
    is_default_calendar: bool,
    #[serde(rename = "canEdit", default)]
    can_edit: bool,
    #[serde(rename = "hexColor")]
    hex_color: Option<String>,
}

impl From<GraphCalendar> for CalendarInfo {
    fn from(calendar: GraphCalendar) -> Self {
        let name = calendar.name.unwrap_or_else(|| calendar.id.clone());
        Self {
            id: calendar.id,
            name,
            description: None,
            is_primary: calendar.is_default_calendar,
            access_role: if calendar.can_edit {
                AccessRole::Writer
            } else {
                AccessRole::Reader
            },
            background_color: calendar.hex_color.filter(|color| !color.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphEvent {
    id: String,
    subject: Option<String>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
    location: Option<GraphLocation>,
    start: Option<GraphDateTimeZone>,
    end: Option<GraphDateTimeZone>,
    #[serde(rename = "isAllDay", default)]
    is_all_day: bool,
    #[serde(rename = "showAs")]
    show_as: Option<String>,
    organizer: Option<GraphRecipient>,
    #[serde(default)]
    attendees: Vec<GraphAttendee>,
    #[serde(rename = "webLink")]
    web_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphDateTimeZone {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphLocation {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphRecipient {
    #[serde(rename = "emailAddress")]
    email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    address: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphAttendee {
    #[serde(rename = "emailAddress")]
    email_address: Option<GraphEmailAddress>,
    status: Option<GraphResponseStatus>,
}

#[derive(Debug, Deserialize)]
struct GraphResponseStatus {
    response: Option<String>,
}

fn map_show_as(show_as: Option<&str>) -> EventStatus {
    match show_as {
        Some("free") => EventStatus::Cancelled,
        Some("tentative") => EventStatus::Tentative,
        _ => EventStatus::Confirmed,
    }
}

fn map_attendee_response(response: Option<&str>) -> ResponseStatus {
    match response {
        Some("accepted") | Some("organizer") => ResponseStatus::Accepted,
        Some("declined") => ResponseStatus::Declined,
        Some("tentativelyAccepted") => ResponseStatus::Tentative,
        _ => ResponseStatus::NeedsAction,
    }
}

/// Parse a Graph datetime. The API returns values like
/// "2026-02-20T10:00:00.0000000" without a timezone suffix; those are UTC.
fn parse_graph_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let with_z = format!("{s}Z");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&with_z) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    None
}

fn normalize_event(event: GraphEvent, calendar_id: &str) -> Option<CalendarEvent> {
    let start_time = parse_graph_datetime(event.start?.date_time.as_deref()?)?;
    let end_time = parse_graph_datetime(event.end?.date_time.as_deref()?)?;

    let attendees = event
        .attendees
        .into_iter()
        .filter_map(|attendee| {
            let address = attendee.email_address?;
            Some(Attendee {
                email: address.address?,
                name: address.name,
                response_status: map_attendee_response(
                    attendee
                        .status
                        .as_ref()
                        .and_then(|s| s.response.as_deref()),
                ),
            })
        })
        .collect();

    Some(CalendarEvent {
        id: event.id,
        calendar_id: calendar_id.to_string(),
        title: event.subject.unwrap_or_default(),
        description: event.body_preview.filter(|preview| !preview.is_empty()),
        location: event
            .location
            .and_then(|l| l.display_name)
            .filter(|name| !name.is_empty()),
        start_time,
        end_time,
        is_all_day: event.is_all_day,
        status: map_show_as(event.show_as.as_deref()),
        organizer: event
            .organizer
            .and_then(|o| o.email_address)
            .and_then(|a| a.address),
        attendees,
        html_link: event.web_link,
    })
}
