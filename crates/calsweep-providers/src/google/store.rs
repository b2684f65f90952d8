//! [`CalendarStore`] implementation backed by Google Calendar.

use calsweep_core::{CalendarEvent, TimeWindow};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult, StoreOperation};
use crate::store::{BoxFuture, CalendarStore, EventPage, EventPatch};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenStorage;

/// Google Calendar store.
///
/// Every call first makes sure the stored access token is still valid,
/// refreshing it with the refresh token when it is about to expire.
pub struct GoogleStore {
    config: GoogleConfig,
    name: String,
    token_storage: TokenStorage,
    oauth_client: OAuthClient,
    client: GoogleCalendarClient,
    // serializes refreshes so concurrent calls do not refresh twice
    refresh_lock: Mutex<()>,
}

impl GoogleStore {
    /// Creates a store and loads any persisted tokens.
    ///
    /// No network call is made; use [`authenticate`](Self::authenticate)
    /// when [`needs_reauth`](Self::needs_reauth) says so.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(|e| {
            ProviderError::configuration(format!("invalid Google configuration: {e}"))
        })?;

        let token_storage = TokenStorage::new(&config.token_path);
        if let Err(e) = token_storage.load() {
            warn!(error = %e, "ignoring unreadable token file");
        }

        let oauth_client = OAuthClient::new(config.credentials.clone(), config.timeout)?;
        let client =
            GoogleCalendarClient::new(&config.api_base, config.timeout, &config.user_agent)?;

        Ok(Self {
            name: config.store_name(),
            config,
            token_storage,
            oauth_client,
            client,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Runs the browser authorization flow and persists the tokens.
    pub async fn authenticate(&self) -> ProviderResult<()> {
        info!(account = %self.config.account_name, "starting Google authorization");
        let tokens = self
            .oauth_client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;
        self.token_storage.set(tokens)?;
        info!(path = %self.token_storage.path().display(), "authorization saved");
        Ok(())
    }

    /// True when there are no tokens, or they were granted for fewer scopes
    /// than configured (e.g. a read-only token from an older setup).
    pub fn needs_reauth(&self) -> bool {
        self.token_storage.needs_reauth(&self.config.scopes)
    }

    /// True when a call could succeed without user interaction.
    pub fn is_authenticated(&self) -> bool {
        self.token_storage
            .get()
            .is_some_and(|t| !t.is_expired() || t.refresh_token.is_some())
    }

    /// Removes the persisted tokens.
    pub fn sign_out(&self) -> ProviderResult<()> {
        self.token_storage.clear()
    }

    /// Returns a usable access token, refreshing it if needed.
    async fn access_token(&self) -> ProviderResult<String> {
        let not_authorized = || {
            ProviderError::authentication("not authorized, run 'calsweep auth google'")
                .during(StoreOperation::Auth)
        };

        let tokens = self.token_storage.get().ok_or_else(not_authorized)?;
        if !tokens.is_expired() {
            return Ok(tokens.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // another call may have refreshed while we waited
        let tokens = self.token_storage.get().ok_or_else(not_authorized)?;
        if !tokens.is_expired() {
            return Ok(tokens.access_token);
        }

        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            ProviderError::authentication(
                "access token expired and no refresh token is stored, run 'calsweep auth google --force'",
            )
            .during(StoreOperation::Auth)
        })?;

        debug!("refreshing expired access token");
        let (access_token, expires_in) = self.oauth_client.refresh(refresh_token).await?;
        self.token_storage
            .refresh_access_token(access_token.clone(), expires_in)?;
        Ok(access_token)
    }
}

impl CalendarStore for GoogleStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeWindow,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            self.client
                .list_events_page(&token, calendar_id, window, page_token)
                .await
        })
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        patch: &'a EventPatch,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            self.client
                .patch_event(&token, calendar_id, event_id, patch)
                .await
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            self.client.delete_event(&token, calendar_id, event_id).await
        })
    }

    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            self.client.insert_event(&token, calendar_id, event).await
        })
    }
}
