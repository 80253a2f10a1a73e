//! Provider trait and normalized calendar types
//!
//! Every vendor adapter implements [`CalendarProvider`] and returns the
//! normalized shapes defined here; nothing vendor-specific escapes an
//! adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Closed set of supported calendar vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Microsoft,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "google" => Ok(Self::Google),
            "microsoft" => Ok(Self::Microsoft),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

/// Errors from vendor adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The vendor rejected a token exchange or refresh.
    #[error("{provider} rejected credentials (status {status})")]
    UpstreamAuth {
        provider: String,
        status: u16,
        body: Option<String>,
    },
    /// The vendor was unreachable or a data read answered non-2xx.
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: String,
        status: Option<u16>,
        message: String,
    },
    /// The vendor answered 2xx with a body we could not interpret.
    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },
}

impl ProviderError {
    pub fn upstream_auth(provider: ProviderKind, status: u16, body: Option<String>) -> Self {
        Self::UpstreamAuth {
            provider: provider.to_string(),
            status,
            body,
        }
    }

    pub fn transport(provider: ProviderKind, status: Option<u16>, message: String) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            status,
            message,
        }
    }

    pub fn malformed(provider: ProviderKind, message: String) -> Self {
        Self::Malformed {
            provider: provider.to_string(),
            message,
        }
    }

    pub fn from_reqwest(provider: ProviderKind, error: reqwest::Error) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

/// Tokens returned from a code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    /// Vendors may omit the refresh token on re-consent and on refresh.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Identity of the vendor account behind a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub email: String,
    pub name: Option<String>,
}

/// Caller's access level on a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AccessRole {
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "writer")]
    Writer,
    #[serde(rename = "reader")]
    Reader,
    #[serde(rename = "freeBusyReader")]
    FreeBusyReader,
}

/// Normalized calendar descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_primary: bool,
    pub access_role: AccessRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Normalized event status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// Normalized attendee response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ResponseStatus {
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "declined")]
    Declined,
    #[serde(rename = "tentative")]
    Tentative,
    #[serde(rename = "needsAction")]
    NeedsAction,
}

/// Normalized event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Attendee {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub response_status: ResponseStatus,
}

/// Normalized calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CalendarEvent {
    pub id: String,
    pub calendar_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_all_day: bool,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    pub attendees: Vec<Attendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

/// Interface every calendar vendor adapter implements.
///
/// Adapters are read-only: they never create or mutate anything on the vendor
/// side, and they never retry. One vendor call per adapter call.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Which vendor this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Sentinel calendar ID meaning "the account's default calendar".
    fn primary_calendar_id(&self) -> &str {
        "primary"
    }

    /// Builds the vendor authorize URL embedding our callback and state.
    fn build_authorize_url(&self, callback_url: &str, state: &str) -> Result<Url, ProviderError>;

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(&self, code: &str, callback_url: &str)
    -> Result<TokenSet, ProviderError>;

    /// Exchanges a refresh token for a fresh access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, ProviderError>;

    /// Fetches the identity of the account behind the access token.
    async fn fetch_account_info(&self, access_token: &str) -> Result<AccountInfo, ProviderError>;

    /// Lists the calendars visible to the account.
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, ProviderError>;

    /// Lists events in `[start, end)` on one calendar.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, ProviderError>;
}
