//! Title-matching rules.
//!
//! Rules come from configuration as [`RuleConfig`] (a textual match type, a
//! pattern and an optional color) and are compiled once into [`Rule`]s before
//! any calendar call is made, so a malformed regex or an unknown match type is
//! reported as a configuration problem instead of surfacing per event.
//!
//! All comparisons are case-insensitive. An absent, empty or all-whitespace
//! title never matches any rule.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors raised while compiling rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The pattern of a `regex` rule does not compile.
    #[error("rule #{index}: invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The match type is not one of `equals`, `contains`, `regex`.
    #[error("rule #{index}: unknown match type {match_type:?} (expected equals, contains or regex)")]
    UnknownMatchType { index: usize, match_type: String },
}

/// A rule as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// `equals`, `contains` or `regex`; the tag itself is case-insensitive.
    #[serde(alias = "matchType")]
    pub match_type: String,
    /// Interpreted according to `match_type`.
    pub pattern: String,
    /// Color to apply; only meaningful for color rules.
    #[serde(default, alias = "colorId", skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
}

impl RuleConfig {
    /// Creates a rule configuration without a color.
    pub fn new(match_type: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            match_type: match_type.into(),
            pattern: pattern.into(),
            color_id: None,
        }
    }

    /// Builder method to set the color.
    pub fn with_color(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }
}

/// How unknown match types are treated at compile time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RulePolicy {
    /// Reject unknown match types.
    #[default]
    Strict,
    /// Keep unknown match types as rules that never match.
    Lenient,
}

/// The compiled predicate of a rule.
#[derive(Debug, Clone)]
pub enum TitleMatcher {
    /// Whole-title equality; holds the lowercased pattern.
    Equals(String),
    /// Substring test; holds the lowercased pattern.
    Contains(String),
    /// Case-insensitive regex, matching anywhere in the title.
    Regex(Regex),
    /// Unknown match type kept under [`RulePolicy::Lenient`]. Never matches.
    Disabled(String),
}

impl TitleMatcher {
    fn is_match(&self, title: &str) -> bool {
        match self {
            Self::Equals(pattern) => title.to_lowercase() == *pattern,
            Self::Contains(pattern) => title.to_lowercase().contains(pattern.as_str()),
            Self::Regex(re) => re.is_match(title),
            Self::Disabled(_) => false,
        }
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: TitleMatcher,
    pub pattern: String,
    pub color_id: Option<String>,
}

impl Rule {
    /// Compiles one configured rule. `index` is only used in error messages.
    pub fn compile(config: &RuleConfig, index: usize, policy: RulePolicy) -> Result<Self, RuleError> {
        let matcher = match config.match_type.to_lowercase().as_str() {
            "equals" => TitleMatcher::Equals(config.pattern.to_lowercase()),
            "contains" => TitleMatcher::Contains(config.pattern.to_lowercase()),
            "regex" => {
                let re = RegexBuilder::new(&config.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| RuleError::InvalidRegex {
                        index,
                        pattern: config.pattern.clone(),
                        source,
                    })?;
                TitleMatcher::Regex(re)
            }
            other => match policy {
                RulePolicy::Strict => {
                    return Err(RuleError::UnknownMatchType {
                        index,
                        match_type: config.match_type.clone(),
                    });
                }
                RulePolicy::Lenient => {
                    warn!(rule = index, match_type = other, "unknown match type, rule will never match");
                    TitleMatcher::Disabled(config.match_type.clone())
                }
            },
        };

        Ok(Self {
            matcher,
            pattern: config.pattern.clone(),
            color_id: config.color_id.clone().filter(|c| !c.is_empty()),
        })
    }
}

/// Tests one rule against an event title.
pub fn matches(summary: Option<&str>, rule: &Rule) -> bool {
    match summary {
        Some(title) if !title.trim().is_empty() => rule.matcher.is_match(title),
        _ => false,
    }
}

/// An ordered list of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compiles configured rules, keeping their order.
    pub fn compile(configs: &[RuleConfig], policy: RulePolicy) -> Result<Self, RuleError> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(index, config)| Rule::compile(config, index, policy))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Returns the first rule, in list order, that matches the title.
    pub fn first_match(&self, summary: Option<&str>) -> Option<&Rule> {
        self.rules.iter().find(|rule| matches(summary, rule))
    }

    /// Returns true if at least one rule matches the title.
    pub fn any_match(&self, summary: Option<&str>) -> bool {
        self.rules.iter().any(|rule| matches(summary, rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(match_type: &str, pattern: &str) -> Rule {
        Rule::compile(&RuleConfig::new(match_type, pattern), 0, RulePolicy::Lenient).unwrap()
    }

    #[test]
    fn equals_ignores_case_on_both_sides() {
        let r = rule("equals", "Standup");
        assert!(matches(Some("Standup"), &r));
        assert!(matches(Some("STANDUP"), &r));
        assert!(matches(Some("standup"), &r));
        assert!(!matches(Some("Standup call"), &r));

        let upper = rule("equals", "STANDUP");
        assert!(matches(Some("standup"), &upper));
    }

    #[test]
    fn equals_handles_non_ascii_case() {
        assert!(matches(Some("ÉCOLE"), &rule("equals", "école")));
        assert!(matches(Some("école"), &rule("equals", "ÉCOLE")));
        assert!(!matches(Some("ecole"), &rule("equals", "école")));
    }

    #[test]
    fn contains_is_case_insensitive_substring() {
        let r = rule("contains", "Gym");
        assert!(matches(Some("Morning Gym"), &r));
        assert!(matches(Some("morning gym session"), &r));
        assert!(!matches(Some("Swimming"), &r));
    }

    #[test]
    fn empty_contains_pattern_matches_any_non_empty_title() {
        let r = rule("contains", "");
        assert!(matches(Some("anything"), &r));
        assert!(!matches(Some(""), &r));
    }

    #[test]
    fn regex_matches_anywhere_ignoring_case() {
        let r = rule("regex", r"^\[ooo\]");
        assert!(matches(Some("[OOO] vacation"), &r));
        assert!(!matches(Some("vacation [ooo]"), &r));

        let anywhere = rule("regex", "sync|review");
        assert!(matches(Some("Weekly REVIEW"), &anywhere));
    }

    #[test]
    fn match_type_tag_is_case_insensitive() {
        let r = rule("Contains", "gym");
        assert!(matches!(r.matcher, TitleMatcher::Contains(_)));
        let r = rule("REGEX", "gym");
        assert!(matches!(r.matcher, TitleMatcher::Regex(_)));
    }

    #[test]
    fn blank_titles_never_match() {
        let r = rule("contains", "");
        assert!(!matches(None, &r));
        assert!(!matches(Some(""), &r));
        assert!(!matches(Some("   \t"), &r));
    }

    #[test]
    fn unknown_match_type_never_matches_when_lenient() {
        for title in ["Gym", "gym", "anything", ""] {
            assert!(!matches(Some(title), &rule("startswith", "Gym")));
            assert!(!matches(Some(title), &rule("equal", "")));
        }
    }

    #[test]
    fn unknown_match_type_is_rejected_when_strict() {
        let configs = vec![
            RuleConfig::new("contains", "gym"),
            RuleConfig::new("startswith", "x"),
        ];
        let err = RuleSet::compile(&configs, RulePolicy::Strict).unwrap_err();
        assert!(matches!(err, RuleError::UnknownMatchType { index: 1, .. }));
    }

    #[test]
    fn invalid_regex_is_rejected_under_any_policy() {
        let configs = vec![RuleConfig::new("regex", "(unclosed")];
        for policy in [RulePolicy::Strict, RulePolicy::Lenient] {
            let err = RuleSet::compile(&configs, policy).unwrap_err();
            assert!(matches!(err, RuleError::InvalidRegex { index: 0, .. }));
        }
    }

    #[test]
    fn first_match_follows_list_order() {
        let configs = vec![
            RuleConfig::new("contains", "gym").with_color("5"),
            RuleConfig::new("equals", "morning gym").with_color("9"),
        ];
        let set = RuleSet::compile(&configs, RulePolicy::Strict).unwrap();
        let hit = set.first_match(Some("Morning Gym")).unwrap();
        assert_eq!(hit.color_id.as_deref(), Some("5"));
        assert!(set.first_match(Some("Lunch")).is_none());
    }

    #[test]
    fn any_match() {
        let configs = vec![
            RuleConfig::new("equals", "Cancelled"),
            RuleConfig::new("regex", "^tmp:"),
        ];
        let set = RuleSet::compile(&configs, RulePolicy::Strict).unwrap();
        assert!(set.any_match(Some("TMP: draft")));
        assert!(set.any_match(Some("cancelled")));
        assert!(!set.any_match(Some("Standup")));
        assert!(!set.any_match(None));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_color_is_treated_as_absent() {
        let r = Rule::compile(
            &RuleConfig::new("contains", "gym").with_color(""),
            0,
            RulePolicy::Strict,
        )
        .unwrap();
        assert!(r.color_id.is_none());
    }

    #[test]
    fn config_accepts_camel_case_keys() {
        let json = r#"{"matchType": "contains", "pattern": "Gym", "colorId": "5"}"#;
        let config: RuleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, RuleConfig::new("contains", "Gym").with_color("5"));
    }
}
