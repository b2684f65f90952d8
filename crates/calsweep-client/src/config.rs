//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calsweep/config.toml` by default:
//!
//! ```toml
//! strict_rules = true
//!
//! [google]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "env::GOOGLE_CLIENT_SECRET"
//! calendar_id = "primary"
//! time_zone = "Europe/Berlin"
//!
//! [[color_rules]]
//! match_type = "contains"
//! pattern = "Gym"
//! color_id = "5"
//!
//! [[delete_rules]]
//! match_type = "regex"
//! pattern = "^cancelled:"
//! ```
//!
//! Credential values support secret references, see [`crate::secret`].

use std::path::{Path, PathBuf};

use calsweep_core::{RuleConfig, RuleError, RulePolicy, RuleSet};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ClientError, ClientResult};

/// Calendar used when none is configured.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Configuration for the calsweep client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Reject rules with an unknown `match_type` instead of never matching them.
    pub strict_rules: bool,

    /// Google Calendar settings.
    pub google: GoogleSettings,

    /// Recolor rules; the first matching rule wins.
    #[serde(alias = "ColorRules")]
    pub color_rules: Vec<RuleConfig>,

    /// Delete rules; any matching rule deletes.
    #[serde(alias = "DeleteRules")]
    pub delete_rules: Vec<RuleConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            strict_rules: true,
            google: GoogleSettings::default(),
            color_rules: Vec::new(),
            delete_rules: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsweep")
    }

    pub fn rule_policy(&self) -> RulePolicy {
        if self.strict_rules {
            RulePolicy::Strict
        } else {
            RulePolicy::Lenient
        }
    }

    /// Compiles the recolor rules.
    pub fn color_rule_set(&self) -> Result<RuleSet, RuleError> {
        RuleSet::compile(&self.color_rules, self.rule_policy())
    }

    /// Compiles the delete rules.
    pub fn delete_rule_set(&self) -> Result<RuleSet, RuleError> {
        RuleSet::compile(&self.delete_rules, self.rule_policy())
    }

    /// Checks everything that can be checked without touching the network.
    ///
    /// Color rules without a `color_id` are accepted with a warning: they
    /// match, but never change anything.
    pub fn validate(&self) -> ClientResult<()> {
        self.color_rule_set()?;
        self.delete_rule_set()?;
        self.google.zone()?;

        for (index, rule) in self.color_rules.iter().enumerate() {
            if rule.color_id.as_deref().is_none_or(str::is_empty) {
                warn!(rule = index, pattern = %rule.pattern, "color rule has no color_id");
            }
        }
        Ok(())
    }
}

/// Google Calendar settings.
///
/// Credentials (`client_id`, `client_secret`) support secret references
/// (`pass::…`, `env::…`, `file::…`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID.
    #[serde(alias = "ClientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[serde(alias = "ClientSecret", skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Calendar to operate on. Blank means `primary`.
    #[serde(alias = "CalendarId", skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,

    /// IANA zone used to read bare dates on the command line and to fill in
    /// the end zone of copied timed events.
    #[serde(alias = "TimeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,

    /// Path to token storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
}

impl GoogleSettings {
    /// The configured calendar, or `primary` when unset or blank.
    pub fn calendar_id(&self) -> &str {
        self.calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_CALENDAR_ID)
    }

    /// The configured zone, if any, checked against the tz database.
    pub fn zone(&self) -> ClientResult<Option<Tz>> {
        match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|_| ClientError::Config(format!("unknown time zone {name:?}"))),
        }
    }

    /// Converts to store configuration, resolving secret references.
    #[cfg(feature = "google")]
    pub fn to_provider_config(&self) -> ClientResult<calsweep_providers::google::GoogleConfig> {
        use calsweep_providers::google::GoogleConfig;

        let credentials = self.resolve_credentials()?;
        credentials
            .validate()
            .map_err(|e| ClientError::Config(format!("invalid Google credentials: {e}")))?;

        let mut config = GoogleConfig::new(credentials);
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(path);
        }
        Ok(config)
    }

    /// Resolves the OAuth client from `client_id` and `client_secret`.
    #[cfg(feature = "google")]
    pub(crate) fn resolve_credentials(
        &self,
    ) -> ClientResult<calsweep_providers::google::OAuthCredentials> {
        use calsweep_providers::google::OAuthCredentials;

        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            ClientError::Config(format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: calsweep auth google --credentials-file <path>",
                ClientConfig::default_path().display()
            ))
        })?;
        let raw_secret = self.client_secret.as_deref().ok_or_else(|| {
            ClientError::Config("client_secret is missing from the [google] section".to_string())
        })?;

        let client_id = crate::secret::resolve(raw_id).map_err(|source| ClientError::Secret {
            field: "client_id",
            source,
        })?;
        let client_secret =
            crate::secret::resolve(raw_secret).map_err(|source| ClientError::Secret {
                field: "client_secret",
                source,
            })?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert!(config.strict_rules);
        assert_eq!(config.google.calendar_id(), "primary");
        assert!(config.color_rules.is_empty());
        assert_eq!(config.rule_policy(), RulePolicy::Strict);
    }

    #[test]
    fn blank_calendar_id_means_primary() {
        let config = ClientConfig::parse("[google]\ncalendar_id = \"   \"\n").unwrap();
        assert_eq!(config.google.calendar_id(), "primary");

        let config = ClientConfig::parse("[google]\ncalendar_id = \"team@example.com\"\n").unwrap();
        assert_eq!(config.google.calendar_id(), "team@example.com");
    }

    #[test]
    fn rules_keep_file_order() {
        let config = ClientConfig::parse(
            r#"
[[color_rules]]
match_type = "contains"
pattern = "Gym"
color_id = "5"

[[color_rules]]
matchType = "equals"
pattern = "Morning Gym"
colorId = "9"

[[delete_rules]]
match_type = "regex"
pattern = "^cancelled:"
"#,
        )
        .unwrap();

        assert_eq!(config.color_rules.len(), 2);
        assert_eq!(config.color_rules[1].color_id.as_deref(), Some("9"));

        let colors = config.color_rule_set().unwrap();
        let rule = colors.first_match(Some("Morning Gym")).unwrap();
        assert_eq!(rule.color_id.as_deref(), Some("5"));

        let deletes = config.delete_rule_set().unwrap();
        assert!(deletes.any_match(Some("Cancelled: retro")));
    }

    #[test]
    fn unknown_match_type_depends_on_strictness() {
        let text = "[[delete_rules]]\nmatch_type = \"startswith\"\npattern = \"x\"\n";

        let strict = ClientConfig::parse(text).unwrap();
        assert!(matches!(
            strict.validate(),
            Err(ClientError::Rules(RuleError::UnknownMatchType { .. }))
        ));

        let lenient = ClientConfig::parse(&format!("strict_rules = false\n{text}")).unwrap();
        lenient.validate().unwrap();
        assert!(!lenient.delete_rule_set().unwrap().any_match(Some("x")));
    }

    #[test]
    fn invalid_regex_fails_validation() {
        let config = ClientConfig::parse(
            "[[color_rules]]\nmatch_type = \"regex\"\npattern = \"(unclosed\"\ncolor_id = \"1\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ClientError::Rules(RuleError::InvalidRegex { .. }))
        ));
    }

    #[test]
    fn time_zone_is_checked() {
        let ok = ClientConfig::parse("[google]\ntime_zone = \"Europe/Berlin\"\n").unwrap();
        assert_eq!(ok.google.zone().unwrap(), Some(chrono_tz::Europe::Berlin));

        let bad = ClientConfig::parse("[google]\ntime_zone = \"Mars/Olympus\"\n").unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn load_from_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "strict_rules = maybe\n").unwrap();

        let err = ClientConfig::load_from(&path).unwrap_err().to_string();
        assert!(err.contains("config.toml"));
    }

    #[test]
    fn dump_round_trips_through_toml() {
        let mut config = ClientConfig::default();
        config.google.calendar_id = Some("work".to_string());
        config.color_rules.push(RuleConfig::new("contains", "Gym").with_color("5"));

        let text = toml::to_string_pretty(&config).unwrap();
        let back = ClientConfig::parse(&text).unwrap();
        assert_eq!(back.google.calendar_id(), "work");
        assert_eq!(back.color_rules, config.color_rules);
    }

    #[cfg(feature = "google")]
    mod google {
        use super::*;

        #[test]
        fn plain_credentials_resolve() {
            let settings = GoogleSettings {
                client_id: Some("test-id.apps.googleusercontent.com".to_string()),
                client_secret: Some("test-secret".to_string()),
                ..Default::default()
            };
            let creds = settings.resolve_credentials().unwrap();
            assert_eq!(creds.client_id, "test-id.apps.googleusercontent.com");
            assert_eq!(creds.client_secret, "test-secret");
        }

        #[test]
        fn env_references_resolve() {
            unsafe {
                std::env::set_var("_CALSWEEP_CFG_ID", "env-id.apps.googleusercontent.com");
                std::env::set_var("_CALSWEEP_CFG_SECRET", "env-secret");
            }

            let config = ClientConfig::parse(
                "[google]\nclient_id = \"env::_CALSWEEP_CFG_ID\"\nclient_secret = \"env::_CALSWEEP_CFG_SECRET\"\n",
            )
            .unwrap();
            let creds = config.google.resolve_credentials().unwrap();
            assert_eq!(creds.client_id, "env-id.apps.googleusercontent.com");
            assert_eq!(creds.client_secret, "env-secret");

            unsafe {
                std::env::remove_var("_CALSWEEP_CFG_ID");
                std::env::remove_var("_CALSWEEP_CFG_SECRET");
            }
        }

        #[test]
        fn missing_credentials_error() {
            let err = GoogleSettings::default().resolve_credentials().unwrap_err();
            assert!(err.to_string().contains("credentials not found"));

            let only_id = GoogleSettings {
                client_id: Some("id.apps.googleusercontent.com".to_string()),
                ..Default::default()
            };
            let err = only_id.resolve_credentials().unwrap_err();
            assert!(err.to_string().contains("client_secret"));
        }

        #[test]
        fn unresolvable_secret_names_the_field() {
            let settings = GoogleSettings {
                client_id: Some("id.apps.googleusercontent.com".to_string()),
                client_secret: Some("env::_CALSWEEP_NOT_SET_EITHER".to_string()),
                ..Default::default()
            };
            let err = settings.resolve_credentials().unwrap_err();
            assert!(matches!(err, ClientError::Secret { field: "client_secret", .. }));
        }

        #[test]
        fn provider_config_uses_token_path() {
            let settings = GoogleSettings {
                client_id: Some("test.apps.googleusercontent.com".to_string()),
                client_secret: Some("test-secret".to_string()),
                token_path: Some(PathBuf::from("/tmp/calsweep-tokens.json")),
                ..Default::default()
            };
            let config = settings.to_provider_config().unwrap();
            assert_eq!(config.credentials.client_secret, "test-secret");
            assert_eq!(config.token_path, PathBuf::from("/tmp/calsweep-tokens.json"));
        }
    }
}
