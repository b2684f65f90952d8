//! Google Calendar store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Problems with the OAuth client credentials.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("failed to read credentials file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse credentials JSON: {0}")]
    Parse(String),

    #[error("credentials JSON has neither an 'installed'/'web' section nor a top-level client_id/client_secret")]
    MissingClient,

    #[error("{0}")]
    Invalid(&'static str),
}

/// OAuth 2.0 client credentials for the Calendar API.
///
/// Google requires every installed application to bring its own client, so
/// these come from the user's configuration or a downloaded credentials file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Layout of the credentials JSON downloaded from the Cloud Console.
///
/// Desktop clients nest the values under `installed`, web clients under
/// `web`; some tools write them flat at the top level.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CredentialsError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from the JSON text of a credentials file.
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let file: CredentialsFile =
            serde_json::from_str(json).map_err(|e| CredentialsError::Parse(e.to_string()))?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self::new(section.client_id, section.client_secret));
        }

        match (file.client_id, file.client_secret) {
            (Some(id), Some(secret)) => Ok(Self::new(id, secret)),
            _ => Err(CredentialsError::MissingClient),
        }
    }

    /// Checks the shape of the credentials without contacting Google.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.client_id.trim().is_empty() {
            return Err(CredentialsError::Invalid("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(CredentialsError::Invalid(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.trim().is_empty() {
            return Err(CredentialsError::Invalid("client_secret is required"));
        }
        Ok(())
    }
}

/// Configuration for [`GoogleStore`](super::GoogleStore).
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Distinguishes token files when several Google accounts are used.
    pub account_name: String,

    pub credentials: OAuthCredentials,

    /// Where OAuth tokens are persisted.
    ///
    /// Defaults to `~/.local/share/calsweep/google-tokens-{account}.json`.
    pub token_path: PathBuf,

    /// Per-request timeout.
    pub timeout: Duration,

    pub user_agent: String,

    /// Ports tried, in order, for the OAuth loopback redirect.
    pub loopback_port_range: (u16, u16),

    /// OAuth scopes requested during authorization.
    pub scopes: Vec<String>,

    /// Calendar API root; only changed to point at a test server.
    pub api_base: String,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-write access to events; recolor, delete and copy all mutate.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar";

    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            account_name: "default".to_string(),
            credentials,
            token_path: Self::default_token_path("default"),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calsweep/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }

    /// Default token file for an account.
    pub fn default_token_path(account_name: &str) -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".local").join("share"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsweep")
            .join(format!("google-tokens-{account_name}.json"))
    }

    /// Sets the account name, moving the token path along if it was the default.
    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.token_path == Self::default_token_path(&self.account_name) {
            self.token_path = Self::default_token_path(&name);
        }
        self.account_name = name;
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Store name used in log lines, e.g. `google:work`.
    pub fn store_name(&self) -> String {
        format!("google:{}", self.account_name)
    }

    pub fn validate(&self) -> Result<(), CredentialsError> {
        self.credentials.validate()?;
        if self.scopes.is_empty() {
            return Err(CredentialsError::Invalid("at least one OAuth scope is required"));
        }
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(CredentialsError::Invalid("invalid loopback port range"));
        }
        Ok(())
    }
}
