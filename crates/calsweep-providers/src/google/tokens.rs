//! Persisted OAuth tokens.
//!
//! Tokens live in a JSON file readable only by the user. The access token is
//! treated as expired a minute before Google says it is, so a long bulk run
//! refreshes before a request is rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult, StoreOperation};

const EXPIRY_MARGIN_SECS: i64 = 60;

fn expiry_from(expires_in_secs: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in_secs.map(|secs| Utc::now() + TimeDelta::seconds(secs - EXPIRY_MARGIN_SECS))
}

/// An OAuth token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry of `access_token`, already shortened by the safety margin.
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes granted at authorization time.
    pub scopes: Vec<String>,
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_from(expires_in_secs),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Replaces the access token after a refresh. The refresh token is kept.
    pub fn refreshed(&mut self, access_token: impl Into<String>, expires_in_secs: Option<i64>) {
        self.access_token = access_token.into();
        self.expires_at = expiry_from(expires_in_secs);
        self.last_refresh = Utc::now();
    }
}

fn storage_error(message: String) -> ProviderError {
    ProviderError::configuration(message).during(StoreOperation::Auth)
}

/// File-backed token storage with an in-memory copy.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<TokenInfo>> {
        // the guarded value is a plain Option, still usable after a panic elsewhere
        self.tokens.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<TokenInfo>> {
        self.tokens.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads tokens from disk. Returns `Ok(false)` if there is no token file.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| storage_error(format!("failed to read token file: {e}")))?;
        let tokens: TokenInfo = serde_json::from_str(&content)
            .map_err(|e| storage_error(format!("failed to parse token file: {e}")))?;

        debug!(path = %self.path.display(), "loaded tokens");
        *self.write() = Some(tokens);
        Ok(true)
    }

    /// Writes the current tokens through a temporary file, then restricts
    /// the file to the owner on Unix.
    pub fn save(&self) -> ProviderResult<()> {
        let content = {
            let tokens = self.read();
            let tokens = tokens
                .as_ref()
                .ok_or_else(|| ProviderError::internal("no tokens to save"))?;
            serde_json::to_string_pretty(tokens)
                .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {e}")))?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| storage_error(format!("failed to create token directory: {e}")))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .map_err(|e| storage_error(format!("failed to write token file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
                .map_err(|e| storage_error(format!("failed to restrict token file: {e}")))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| storage_error(format!("failed to move token file into place: {e}")))?;

        debug!(path = %self.path.display(), "saved tokens");
        Ok(())
    }

    pub fn get(&self) -> Option<TokenInfo> {
        self.read().clone()
    }

    /// Replaces the tokens and persists them.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        *self.write() = Some(tokens);
        self.save()
    }

    /// Records a refreshed access token and persists it.
    pub fn refresh_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<()> {
        {
            let mut tokens = self.write();
            let tokens = tokens
                .as_mut()
                .ok_or_else(|| ProviderError::internal("no tokens to refresh"))?;
            tokens.refreshed(access_token, expires_in_secs);
        }
        self.save()
    }

    /// Forgets the tokens and removes the file.
    pub fn clear(&self) -> ProviderResult<()> {
        *self.write() = None;
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| storage_error(format!("failed to remove token file: {e}")))?;
            info!(path = %self.path.display(), "removed stored tokens");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when authorization has to run again: no tokens, or tokens
    /// granted for narrower scopes than `required`.
    pub fn needs_reauth(&self, required: &[String]) -> bool {
        self.read().as_ref().is_none_or(|t| !t.has_scopes(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

    fn scopes() -> Vec<String> {
        vec![SCOPE.to_string()]
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let token = TokenInfo::new("a", Some("r".to_string()), Some(3600), scopes());
        assert!(!token.is_expired());
        assert!(token.expires_at.is_some());
    }

    #[test]
    fn margin_makes_short_lived_tokens_expired() {
        let token = TokenInfo::new("a", None, Some(30), scopes());
        assert!(token.is_expired());
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = TokenInfo::new("a", None, None, vec![]);
        assert!(!token.is_expired());
    }

    #[test]
    fn refresh_keeps_refresh_token() {
        let mut token = TokenInfo::new("old", Some("r".to_string()), Some(0), scopes());
        assert!(token.is_expired());
        token.refreshed("new", Some(3600));
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("r"));
        assert!(!token.is_expired());
    }

    #[test]
    fn scope_check() {
        let token = TokenInfo::new("a", None, None, scopes());
        assert!(token.has_scopes(&scopes()));
        assert!(!token.has_scopes(&["https://www.googleapis.com/auth/tasks".to_string()]));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let storage = TokenStorage::new(&path);
        storage
            .set(TokenInfo::new("a", Some("r".to_string()), Some(3600), scopes()))
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = TokenStorage::new(&path);
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get().unwrap().access_token, "a");
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        storage.set(TokenInfo::new("a", None, None, vec![])).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn refresh_access_token_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        storage
            .set(TokenInfo::new("old", Some("r".to_string()), Some(0), scopes()))
            .unwrap();
        storage.refresh_access_token("new", Some(3600)).unwrap();

        let reloaded = TokenStorage::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.get().unwrap().access_token, "new");
    }

    #[test]
    fn refresh_without_tokens_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("tokens.json"));
        assert!(storage.refresh_access_token("x", None).is_err());
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        storage.set(TokenInfo::new("a", None, None, vec![])).unwrap();
        storage.clear().unwrap();
        assert!(!path.exists());
        assert!(storage.get().is_none());
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("absent.json"));
        assert!(!storage.load().unwrap());
        assert!(storage.needs_reauth(&scopes()));
    }

    #[test]
    fn narrower_scopes_need_reauth() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("tokens.json"));
        storage
            .set(TokenInfo::new(
                "a",
                None,
                None,
                vec!["https://www.googleapis.com/auth/calendar.readonly".to_string()],
            ))
            .unwrap();
        assert!(storage.needs_reauth(&scopes()));
    }
}
