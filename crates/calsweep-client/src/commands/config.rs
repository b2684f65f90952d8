//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dumps the effective configuration as TOML.
pub fn dump(config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    println!("# config.toml ({})", config_path.display());
    println!("{}", render(config)?);
    Ok(())
}

fn render(config: &ClientConfig) -> ClientResult<String> {
    toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {e}")))
}

/// Validates rules, time zone and (when present) Google credentials.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;
    println!(
        "Rules: {} color, {} delete ({}).",
        config.color_rules.len(),
        config.delete_rules.len(),
        if config.strict_rules { "strict" } else { "lenient" }
    );

    #[cfg(feature = "google")]
    if config.google.client_id.is_some() || config.google.client_secret.is_some() {
        config.google.to_provider_config()?;
        println!("Google credentials are valid.");
    }

    println!("Calendar: {}", config.google.calendar_id());
    println!("Configuration is valid.");
    Ok(())
}

/// Shows the configuration file path.
pub fn path(config_path: &Path) -> ClientResult<()> {
    println!("config: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsweep_core::RuleConfig;

    #[test]
    fn rendered_config_hides_unset_values() {
        let mut config = ClientConfig::default();
        config.delete_rules.push(RuleConfig::new("regex", "^cancelled:"));

        let text = render(&config).unwrap();
        assert!(text.contains("strict_rules = true"));
        assert!(text.contains("[[delete_rules]]"));
        assert!(!text.contains("client_secret"));
        assert!(!text.contains("color_id"));
    }

    #[test]
    fn validate_rejects_bad_rules() {
        let mut config = ClientConfig::default();
        config.color_rules.push(RuleConfig::new("glob", "*gym*").with_color("5"));
        assert!(validate(&config).is_err());
    }
}
