//! Calendar connection service
//!
//! Orchestrates the OAuth connect flow and calendar data access on top of the
//! repository and the provider registry. All operations are scoped to the
//! calling user; token material never leaves this layer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::models::calendar_connection::{self, ConnectionInfo};
use crate::oauth_state::{OAuthStateCodec, Platform};
use crate::providers::{
    CalendarEvent, CalendarInfo, CalendarProvider, ProviderKind, ProviderRegistry, TokenSet,
};
use crate::repositories::CalendarConnectionRepository;

/// Authorize URL handed to the client to start an OAuth flow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OAuthUrlGrant {
    /// Vendor authorize URL the client should open
    pub url: String,
    /// Authenticated state token embedded in the URL
    pub state: String,
}

/// Service for connecting calendar accounts and reading their data.
pub struct CalendarConnectionService {
    config: Arc<AppConfig>,
    repo: CalendarConnectionRepository,
    registry: ProviderRegistry,
    state_codec: OAuthStateCodec,
    /// Per-connection refresh locks so concurrent requests against an expired
    /// connection perform a single vendor refresh.
    refresh_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CalendarConnectionService {
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        registry: ProviderRegistry,
    ) -> Self {
        let state_codec = OAuthStateCodec::new(&config.state_signing_key);
        Self {
            config,
            repo: CalendarConnectionRepository::new(db),
            registry,
            state_codec,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lists the caller's connections, newest last.
    pub async fn list_connections(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConnectionInfo>, ServiceError> {
        let connections = self.repo.find_by_user(user_id).await?;
        Ok(connections.into_iter().map(ConnectionInfo::from).collect())
    }

    /// Builds a vendor authorize URL for the caller.
    ///
    /// Persists nothing: the flow only becomes a connection once the callback
    /// lands. The platform is inferred from the redirect target's scheme and
    /// carried in the state token.
    pub async fn get_oauth_url(
        &self,
        user_id: &Uuid,
        provider: &str,
        redirect_url: Option<&str>,
    ) -> Result<OAuthUrlGrant, ServiceError> {
        let kind = parse_provider(provider)?;
        let adapter = self.adapter(kind)?;

        let platform = Platform::from_redirect_url(redirect_url);
        let state = self
            .state_codec
            .encode(kind, platform, user_id)
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let url = adapter.build_authorize_url(&self.config.oauth_callback_url, &state)?;

        tracing::info!(user_id = %user_id, provider = %kind, platform = %platform, "Issued OAuth authorize URL");

        Ok(OAuthUrlGrant {
            url: url.to_string(),
            state,
        })
    }

    /// Completes an OAuth flow: validates state, exchanges the code, and
    /// upserts the connection keyed by `(user, provider, account_email)`.
    ///
    /// When a state token is present its user must match the caller before
    /// anything is sent to the vendor. A callback without state skips state
    /// validation entirely.
    pub async fn handle_oauth_callback(
        &self,
        user_id: &Uuid,
        provider: &str,
        code: &str,
        state: Option<&str>,
    ) -> Result<ConnectionInfo, ServiceError> {
        let kind = parse_provider(provider)?;

        if let Some(token) = state {
            let decoded = self
                .state_codec
                .decode(token)
                .map_err(|e| ServiceError::validation(format!("Invalid state token: {}", e)))?;

            if decoded.provider != kind {
                return Err(ServiceError::validation(
                    "State token was issued for a different provider",
                ));
            }
            if decoded.user_id != *user_id {
                return Err(ServiceError::validation(
                    "State token was issued for a different user",
                ));
            }
        }

        if code.is_empty() {
            return Err(ServiceError::validation("Authorization code is required"));
        }

        let adapter = self.adapter(kind)?;

        let tokens = adapter
            .exchange_code(code, &self.config.oauth_callback_url)
            .await?;
        let account = adapter.fetch_account_info(&tokens.access_token).await?;

        let connection = self
            .upsert_connection(user_id, kind, &account.email, account.name, tokens)
            .await?;

        counter!("calendar_connections_established_total", "provider" => kind.as_str())
            .increment(1);
        tracing::info!(
            user_id = %user_id,
            provider = %kind,
            connection_id = %connection.id,
            "Calendar connection established"
        );

        Ok(connection.into())
    }

    /// Hard-deletes a connection owned by the caller.
    pub async fn disconnect(&self, user_id: &Uuid, id: &Uuid) -> Result<(), ServiceError> {
        let deleted = self.repo.delete_owned(user_id, id).await?;
        if !deleted {
            return Err(ServiceError::not_found("Connection not found"));
        }

        tracing::info!(user_id = %user_id, connection_id = %id, "Calendar connection removed");
        Ok(())
    }

    /// Lists the calendars behind an active connection owned by the caller.
    pub async fn list_calendars(
        &self,
        user_id: &Uuid,
        connection_id: &Uuid,
    ) -> Result<Vec<CalendarInfo>, ServiceError> {
        let connection = self.active_connection(user_id, connection_id).await?;
        let adapter = self.adapter_for(&connection)?;

        let access_token = self.ensure_fresh_token(&connection, &adapter).await?;
        Ok(adapter.list_calendars(&access_token).await?)
    }

    /// Lists events on one calendar behind an active connection.
    ///
    /// `calendar_id` defaults to the adapter's primary calendar sentinel.
    pub async fn list_events(
        &self,
        user_id: &Uuid,
        connection_id: &Uuid,
        calendar_id: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        if end <= start {
            return Err(ServiceError::validation(
                "end_date must be after start_date",
            ));
        }

        let connection = self.active_connection(user_id, connection_id).await?;
        let adapter = self.adapter_for(&connection)?;
        let calendar_id = calendar_id.unwrap_or_else(|| adapter.primary_calendar_id());

        let access_token = self.ensure_fresh_token(&connection, &adapter).await?;
        Ok(adapter
            .list_events(&access_token, calendar_id, start, end, max_results)
            .await?)
    }

    async fn active_connection(
        &self,
        user_id: &Uuid,
        connection_id: &Uuid,
    ) -> Result<calendar_connection::Model, ServiceError> {
        let connection = self
            .repo
            .find_owned(user_id, connection_id)
            .await?
            .filter(|connection| connection.is_active)
            .ok_or_else(|| ServiceError::not_found("Connection not found"))?;
        Ok(connection)
    }

    /// Returns a usable access token for the connection, refreshing first when
    /// the stored token has a recorded expiry in the past.
    ///
    /// Refreshes for one connection are serialized: the first request through
    /// performs the vendor call, later waiters re-read the row and use the
    /// fresh token. A rejected refresh deactivates the connection. When no
    /// refresh token is stored, the stale token is handed through unchanged.
    async fn ensure_fresh_token(
        &self,
        connection: &calendar_connection::Model,
        adapter: &Arc<dyn CalendarProvider>,
    ) -> Result<String, ServiceError> {
        if !token_is_expired(connection) {
            return Ok(connection.access_token.clone());
        }

        let lock = {
            let mut locks = self.refresh_locks.lock().await;
            Arc::clone(locks.entry(connection.id).or_default())
        };
        let _guard = lock.lock().await;

        // Another request may have finished the refresh while we waited.
        let current = self
            .repo
            .find_owned(&connection.user_id, &connection.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Connection not found"))?;
        if !token_is_expired(&current) {
            if !current.is_active {
                return Err(reconnect_required());
            }
            return Ok(current.access_token);
        }

        let kind = adapter.kind();
        let Some(refresh_token) = current.refresh_token.clone() else {
            // Without a refresh token there is nothing to attempt; hand the
            // stored token to the vendor and let it decide.
            tracing::debug!(
                connection_id = %current.id,
                provider = %kind,
                "Token expired but no refresh token stored, using it as-is"
            );
            return Ok(current.access_token);
        };

        match adapter.refresh_token(&refresh_token).await {
            Ok(tokens) => {
                let new_refresh = tokens
                    .refresh_token
                    .clone()
                    .or_else(|| current.refresh_token.clone());
                let updated = self
                    .repo
                    .update_tokens(
                        &current.id,
                        tokens.access_token,
                        new_refresh,
                        tokens.expires_at,
                    )
                    .await?;

                counter!("calendar_token_refresh_total", "provider" => kind.as_str(), "outcome" => "ok")
                    .increment(1);
                tracing::debug!(connection_id = %current.id, provider = %kind, "Access token refreshed");

                Ok(updated.access_token)
            }
            Err(error) => {
                self.repo.set_active(&current.id, false).await?;
                counter!("calendar_token_refresh_total", "provider" => kind.as_str(), "outcome" => "failed")
                    .increment(1);
                tracing::warn!(
                    connection_id = %current.id,
                    provider = %kind,
                    error = %error,
                    "Token refresh failed, connection deactivated"
                );
                Err(reconnect_required())
            }
        }
    }

    async fn upsert_connection(
        &self,
        user_id: &Uuid,
        kind: ProviderKind,
        account_email: &str,
        account_name: Option<String>,
        tokens: TokenSet,
    ) -> Result<calendar_connection::Model, ServiceError> {
        let existing = self
            .repo
            .find_by_natural_key(user_id, kind.as_str(), account_email)
            .await?;

        let connection = match existing {
            Some(existing) => {
                // Vendors omit the refresh token on re-consent; keep the one
                // we already hold.
                let refresh = tokens
                    .refresh_token
                    .or_else(|| existing.refresh_token.clone());
                let updated = self
                    .repo
                    .update_tokens(&existing.id, tokens.access_token, refresh, tokens.expires_at)
                    .await?;
                if updated.account_name != account_name {
                    self.repo
                        .update_account_name(&updated.id, account_name)
                        .await?
                } else {
                    updated
                }
            }
            None => {
                let now: DateTimeWithTimeZone = Utc::now().into();
                self.repo
                    .create(calendar_connection::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        user_id: Set(*user_id),
                        provider: Set(kind.as_str().to_string()),
                        account_email: Set(account_email.to_string()),
                        account_name: Set(account_name),
                        access_token: Set(tokens.access_token),
                        refresh_token: Set(tokens.refresh_token),
                        token_expires_at: Set(tokens.expires_at.map(DateTimeWithTimeZone::from)),
                        is_active: Set(true),
                        created_at: Set(now),
                        updated_at: Set(now),
                    })
                    .await?
            }
        };

        Ok(connection)
    }

    fn adapter(&self, kind: ProviderKind) -> Result<Arc<dyn CalendarProvider>, ServiceError> {
        self.registry.get(kind).ok_or_else(|| {
            ServiceError::validation(format!("Provider '{}' is not configured", kind))
        })
    }

    fn adapter_for(
        &self,
        connection: &calendar_connection::Model,
    ) -> Result<Arc<dyn CalendarProvider>, ServiceError> {
        let kind = parse_provider(&connection.provider)?;
        self.adapter(kind)
    }
}

fn parse_provider(provider: &str) -> Result<ProviderKind, ServiceError> {
    provider
        .parse()
        .map_err(|_| ServiceError::validation(format!("Unknown provider '{}'", provider)))
}

fn token_is_expired(connection: &calendar_connection::Model) -> bool {
    connection
        .token_expires_at
        .is_some_and(|expires_at| expires_at.with_timezone(&Utc) <= Utc::now())
}

fn reconnect_required() -> ServiceError {
    ServiceError::validation("Calendar connection expired; please reconnect the account")
}
