//! Authentication commands.

use std::path::{Path, PathBuf};

use calsweep_providers::google::{GoogleConfig, GoogleStore, OAuthCredentials};
use tracing::{info, warn};

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Runs the Google authorization flow.
///
/// Credentials come from CLI flags, a `--credentials-file`, or the
/// `[google]` section of `config_path`. Credentials given on the command
/// line are written back to `config_path` so later runs find them.
pub async fn google(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let (credentials, source) =
        resolve_google_credentials(client_id, client_secret, credentials_file, &config.google)?;
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {e}")))?;

    let mut google_config = GoogleConfig::new(credentials.clone());
    if let Some(ref path) = config.google.token_path {
        google_config = google_config.with_token_path(path);
    }
    let store = GoogleStore::new(google_config)?;

    if !store.needs_reauth() && !force {
        remember_credentials(config_path, &credentials, source);
        println!("Already authorized for Google Calendar.");
        println!("Use --force to authorize again.");
        return Ok(());
    }

    if force {
        store.sign_out()?;
    }

    println!("Starting Google Calendar authorization...");
    println!();
    println!("A browser window will open so you can grant calsweep access to your calendar.");
    println!("If it does not, open the URL printed below.");
    println!();

    store.authenticate().await?;
    remember_credentials(config_path, &credentials, source);

    info!("Google authorization successful");
    println!();
    println!("Authorization successful, tokens saved.");
    Ok(())
}

/// Where the credentials were resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialSource {
    /// `--client-id`/`--client-secret` or `--credentials-file`
    Cli,
    /// Already in config.toml
    Config,
}

fn remember_credentials(
    config_path: &Path,
    credentials: &OAuthCredentials,
    source: CredentialSource,
) {
    if source == CredentialSource::Config {
        return;
    }
    match write_credentials(config_path, credentials) {
        Ok(()) => println!("Credentials saved to {}", config_path.display()),
        Err(e) => warn!(path = %config_path.display(), error = %e, "could not save credentials"),
    }
}

/// Writes the credentials under `[google]`, keeping the rest of the file as it was.
fn write_credentials(config_path: &Path, credentials: &OAuthCredentials) -> ClientResult<()> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path)?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ClientError::Config(format!("cannot edit {}: {e}", config_path.display())))?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"].as_table_mut().ok_or_else(|| {
        ClientError::Config(format!("`google` in {} is not a table", config_path.display()))
    })?;
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, doc.to_string())?;
    Ok(())
}

/// Resolves Google credentials.
///
/// Priority (highest to lowest):
/// 1. `--client-id` + `--client-secret`
/// 2. `--credentials-file`
/// 3. `[google]` in config.toml, with secret references expanded
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    settings: &GoogleSettings,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    match (cli_client_id, cli_client_secret) {
        (Some(id), Some(secret)) => {
            return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ClientError::Config(
                "both --client-id and --client-secret are required when giving credentials directly"
                    .to_string(),
            ));
        }
        (None, None) => {}
    }

    if let Some(path) = cli_credentials_file {
        let credentials = OAuthCredentials::from_file(&path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {e}",
                path.display()
            ))
        })?;
        return Ok((credentials, CredentialSource::Cli));
    }

    if settings.client_id.is_some() && settings.client_secret.is_some() {
        return Ok((settings.resolve_credentials()?, CredentialSource::Config));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide them with:\n  \
         - client_id + client_secret under [google] in {}\n  \
         - --client-id and --client-secret\n  \
         - --credentials-file (OAuth client JSON from Google Cloud Console)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
        ClientConfig::default_path().display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> GoogleSettings {
        GoogleSettings {
            client_id: Some("config-id.apps.googleusercontent.com".to_string()),
            client_secret: Some("config-secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn cli_flags_win_over_config() {
        let (creds, source) = resolve_google_credentials(
            Some("cli-id.apps.googleusercontent.com".to_string()),
            Some("cli-secret".to_string()),
            None,
            &configured(),
        )
        .unwrap();
        assert_eq!(creds.client_id, "cli-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "cli-secret");
        assert_eq!(source, CredentialSource::Cli);
    }

    #[test]
    fn config_is_used_without_flags() {
        let (creds, source) =
            resolve_google_credentials(None, None, None, &configured()).unwrap();
        assert_eq!(creds.client_secret, "config-secret");
        assert_eq!(source, CredentialSource::Config);
    }

    #[test]
    fn half_given_flags_fail() {
        let only_id = resolve_google_credentials(
            Some("id.apps.googleusercontent.com".to_string()),
            None,
            None,
            &configured(),
        );
        assert!(only_id.is_err());

        let only_secret =
            resolve_google_credentials(None, Some("secret".to_string()), None, &configured());
        assert!(only_secret.is_err());
    }

    #[test]
    fn nothing_configured_fails() {
        let err = resolve_google_credentials(None, None, None, &GoogleSettings::default())
            .unwrap_err();
        assert!(err.to_string().contains("credentials are required"));
    }

    #[test]
    fn credentials_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "file-id.apps.googleusercontent.com", "client_secret": "file-secret"}}"#,
        )
        .unwrap();

        let (creds, source) =
            resolve_google_credentials(None, None, Some(path), &GoogleSettings::default())
                .unwrap();
        assert_eq!(creds.client_id, "file-id.apps.googleusercontent.com");
        assert_eq!(source, CredentialSource::Cli);
    }

    #[test]
    fn writing_credentials_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "strict_rules = false\n\n[google]\ncalendar_id = \"work\"\n\n[[color_rules]]\nmatch_type = \"contains\"\npattern = \"Gym\"\ncolor_id = \"5\"\n",
        )
        .unwrap();

        write_credentials(
            &path,
            &OAuthCredentials::new("new.apps.googleusercontent.com", "new-secret"),
        )
        .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert!(!config.strict_rules);
        assert_eq!(config.google.calendar_id(), "work");
        assert_eq!(
            config.google.client_id.as_deref(),
            Some("new.apps.googleusercontent.com")
        );
        assert_eq!(config.google.client_secret.as_deref(), Some("new-secret"));
        assert_eq!(config.color_rules.len(), 1);
    }

    #[test]
    fn writing_credentials_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_credentials(&path, &OAuthCredentials::new("a.apps.googleusercontent.com", "b"))
            .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.google.client_secret.as_deref(), Some("b"));
    }
}
