//! Provider registry
//!
//! Maps a [`ProviderKind`] to its adapter instance. The registry is owned by
//! the service and built once at startup from configuration; there is no
//! process-global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::providers::mock::MockCalendarProvider;
use crate::providers::trait_::{CalendarProvider, ProviderKind};
use crate::providers::{GoogleCalendarProvider, MicrosoftCalendarProvider};

/// Closed adapter table keyed by provider kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn CalendarProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ProviderRegistry {
    /// Builds the registry from configuration.
    ///
    /// With `use_mock_providers` set, both kinds resolve to the deterministic
    /// mock adapter. Otherwise an adapter is registered for each vendor with
    /// configured credentials; a vendor without credentials simply stays
    /// unregistered and surfaces as a validation error at request time.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut providers: HashMap<ProviderKind, Arc<dyn CalendarProvider>> = HashMap::new();
        let timeout = Duration::from_secs(config.provider_timeout_seconds);

        if config.use_mock_providers {
            providers.insert(
                ProviderKind::Google,
                Arc::new(MockCalendarProvider::new(ProviderKind::Google)),
            );
            providers.insert(
                ProviderKind::Microsoft,
                Arc::new(MockCalendarProvider::new(ProviderKind::Microsoft)),
            );
            return Self { providers };
        }

        if let (Some(client_id), Some(client_secret)) =
            (&config.google_client_id, &config.google_client_secret)
        {
            let mut google =
                GoogleCalendarProvider::new(client_id.clone(), client_secret.clone(), timeout);
            if let (Some(oauth_base), Some(api_base)) =
                (&config.google_oauth_base, &config.google_api_base)
            {
                let oauth_base = oauth_base.trim_end_matches('/');
                google = google.with_endpoints(
                    format!("{}/o/oauth2/v2/auth", oauth_base),
                    format!("{}/token", oauth_base),
                    api_base.clone(),
                );
            }
            providers.insert(ProviderKind::Google, Arc::new(google));
        }

        if let (Some(client_id), Some(client_secret)) = (
            &config.microsoft_client_id,
            &config.microsoft_client_secret,
        ) {
            let mut microsoft =
                MicrosoftCalendarProvider::new(client_id.clone(), client_secret.clone(), timeout);
            if let (Some(oauth_base), Some(api_base)) =
                (&config.microsoft_oauth_base, &config.microsoft_api_base)
            {
                let oauth_base = oauth_base.trim_end_matches('/');
                microsoft = microsoft.with_endpoints(
                    format!("{}/authorize", oauth_base),
                    format!("{}/token", oauth_base),
                    api_base.clone(),
                );
            }
            providers.insert(ProviderKind::Microsoft, Arc::new(microsoft));
        }

        Self { providers }
    }

    /// Builds a registry from explicit adapters, for tests.
    pub fn with_providers(adapters: Vec<Arc<dyn CalendarProvider>>) -> Self {
        let providers = adapters
            .into_iter()
            .map(|adapter| (adapter.kind(), adapter))
            .collect();
        Self { providers }
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn CalendarProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }
}
