//! Token lifecycle tests at the service layer.
//!
//! Uses a scripted provider so tests control refresh outcomes and observe
//! exactly which vendor calls happen.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use url::Url;
use uuid::Uuid;

use calendar_api::config::AppConfig;
use calendar_api::error::ServiceError;
use calendar_api::models::calendar_connection;
use calendar_api::providers::{
    AccessRole, AccountInfo, CalendarEvent, CalendarInfo, CalendarProvider, ProviderError,
    ProviderKind, ProviderRegistry, TokenSet,
};
use calendar_api::repositories::CalendarConnectionRepository;
use calendar_api::service::CalendarConnectionService;

#[path = "test_utils/mod.rs"]
mod test_utils;

/// Provider whose behavior is scripted per test.
struct ScriptedProvider {
    refresh_succeeds: bool,
    refresh_returns_new_refresh_token: bool,
    refresh_calls: AtomicUsize,
    list_calls: AtomicUsize,
    /// Access tokens observed by list_calendars, in call order.
    seen_tokens: std::sync::Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(refresh_succeeds: bool) -> Self {
        Self {
            refresh_succeeds,
            refresh_returns_new_refresh_token: false,
            refresh_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            seen_tokens: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CalendarProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn build_authorize_url(&self, _callback_url: &str, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse("https://scripted.invalid/authorize").unwrap();
        url.query_pairs_mut().append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        _callback_url: &str,
    ) -> Result<TokenSet, ProviderError> {
        Ok(TokenSet {
            access_token: format!("access-{}", code),
            refresh_token: None,
            expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        // Widen the race window for the concurrency test.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        if !self.refresh_succeeds {
            return Err(ProviderError::upstream_auth(
                ProviderKind::Google,
                400,
                Some("invalid_grant".to_string()),
            ));
        }

        Ok(TokenSet {
            access_token: "refreshed-access".to_string(),
            refresh_token: self
                .refresh_returns_new_refresh_token
                .then(|| "rotated-refresh".to_string()),
            expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
        })
    }

    async fn fetch_account_info(&self, _access_token: &str) -> Result<AccountInfo, ProviderError> {
        Ok(AccountInfo {
            email: "scripted@example.com".to_string(),
            name: None,
        })
    }

    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());

        Ok(vec![CalendarInfo {
            id: "primary".to_string(),
            name: "Scripted".to_string(),
            description: None,
            is_primary: true,
            access_role: AccessRole::Owner,
            background_color: None,
        }])
    }

    async fn list_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _max_results: u32,
    ) -> Result<Vec<CalendarEvent>, ProviderError> {
        Ok(Vec::new())
    }
}

struct Harness {
    service: Arc<CalendarConnectionService>,
    repo: CalendarConnectionRepository,
    provider: Arc<ScriptedProvider>,
}

async fn harness(provider: ScriptedProvider) -> Harness {
    let db = Arc::new(test_utils::setup_test_db().await.unwrap());
    let provider = Arc::new(provider);
    let registry = ProviderRegistry::with_providers(vec![
        Arc::clone(&provider) as Arc<dyn CalendarProvider>
    ]);
    let config = Arc::new(AppConfig {
        state_signing_key: test_utils::TEST_SIGNING_KEY.to_string(),
        ..Default::default()
    });

    Harness {
        service: Arc::new(CalendarConnectionService::new(
            config,
            Arc::clone(&db),
            registry,
        )),
        repo: CalendarConnectionRepository::new(db),
        provider,
    }
}

async fn seed_connection(
    repo: &CalendarConnectionRepository,
    user_id: Uuid,
    refresh_token: Option<&str>,
    token_expires_at: Option<DateTime<Utc>>,
) -> calendar_connection::Model {
    let now: DateTimeWithTimeZone = Utc::now().into();
    repo.create(calendar_connection::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        provider: Set("google".to_string()),
        account_email: Set("scripted@example.com".to_string()),
        account_name: Set(None),
        access_token: Set("stale-access".to_string()),
        refresh_token: Set(refresh_token.map(str::to_string)),
        token_expires_at: Set(token_expires_at.map(DateTimeWithTimeZone::from)),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn no_recorded_expiry_means_no_refresh() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(&h.repo, user_id, Some("refresh-1"), None).await;

    h.service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap();

    assert_eq!(h.provider.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.provider.seen_tokens.lock().unwrap().as_slice(),
        ["stale-access"]
    );
}

#[tokio::test]
async fn future_expiry_means_no_refresh() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-1"),
        Some(Utc::now() + ChronoDuration::hours(1)),
    )
    .await;

    h.service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap();

    assert_eq!(h.provider.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_new_token_used_in_same_request() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-1"),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    h.service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap();

    assert_eq!(h.provider.refresh_calls.load(Ordering::SeqCst), 1);
    // The vendor call ran with the refreshed token, not the stale one.
    assert_eq!(
        h.provider.seen_tokens.lock().unwrap().as_slice(),
        ["refreshed-access"]
    );

    // And the refreshed token was persisted.
    let stored = h
        .repo
        .find_owned(&user_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "refreshed-access");
    assert!(stored.is_active);
}

#[tokio::test]
async fn refresh_without_rotation_preserves_stored_refresh_token() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-keep-me"),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    h.service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap();

    let stored = h
        .repo
        .find_owned(&user_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-keep-me"));
}

#[tokio::test]
async fn rotated_refresh_token_replaces_stored_one() {
    let mut provider = ScriptedProvider::new(true);
    provider.refresh_returns_new_refresh_token = true;
    let h = harness(provider).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-old"),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    h.service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap();

    let stored = h
        .repo
        .find_owned(&user_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("rotated-refresh"));
}

#[tokio::test]
async fn failed_refresh_deactivates_and_skips_vendor_read() {
    let h = harness(ScriptedProvider::new(false)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-1"),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    let error = h
        .service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Validation(message) if message.contains("reconnect")));

    assert_eq!(h.provider.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.provider.list_calls.load(Ordering::SeqCst), 0);

    let stored = h
        .repo
        .find_owned(&user_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);

    // The deactivated connection now reads as missing.
    let error = h
        .service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn expired_without_refresh_token_uses_stored_token() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        None,
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    h.service
        .list_calendars(&user_id, &connection.id)
        .await
        .unwrap();

    assert_eq!(h.provider.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.provider.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.provider.seen_tokens.lock().unwrap().as_slice(),
        ["stale-access"]
    );

    let stored = h
        .repo
        .find_owned(&user_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_active);
}

#[tokio::test]
async fn concurrent_requests_share_a_single_refresh() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-1"),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&h.service);
        let connection_id = connection.id;
        tasks.push(tokio::spawn(async move {
            service.list_calendars(&user_id, &connection_id).await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.provider.refresh_calls.load(Ordering::SeqCst), 1);
    // Every request read with the refreshed token.
    assert!(
        h.provider
            .seen_tokens
            .lock()
            .unwrap()
            .iter()
            .all(|token| token == "refreshed-access")
    );
}

#[tokio::test]
async fn callback_preserves_refresh_token_when_vendor_omits_it() {
    let h = harness(ScriptedProvider::new(true)).await;
    let user_id = Uuid::new_v4();

    // Existing connection holds a refresh token; the scripted exchange never
    // returns one.
    let connection = seed_connection(
        &h.repo,
        user_id,
        Some("refresh-original"),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    )
    .await;

    let reconnected = h
        .service
        .handle_oauth_callback(&user_id, "google", "fresh-code", None)
        .await
        .unwrap();
    assert_eq!(reconnected.id, connection.id);

    let stored = h
        .repo
        .find_owned(&user_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "access-fresh-code");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-original"));
    assert!(stored.is_active);
}
