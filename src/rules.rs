use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationRule {
    pub source_type: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// Destination volume types in priority order.
    #[serde(default)]
    pub destinations: Vec<String>,
}

impl MigrationRule {
    pub fn new(source_type: impl Into<String>, destinations: &[&str]) -> Self {
        Self {
            source_type: source_type.into(),
            alias: None,
            destinations: destinations.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn has_preferences(&self) -> bool {
        self.destinations.iter().any(|d| !d.trim().is_empty())
    }
}

pub fn normalize_type(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Two-level lookup over a rule set: direct type first, then alias. When several rules claim
/// the same key the one declared first wins.
#[derive(Debug, Clone, Default)]
pub struct RuleResolver {
    rules: Vec<MigrationRule>,
    by_type: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl RuleResolver {
    pub fn new(rules: Vec<MigrationRule>) -> Self {
        let mut by_type = HashMap::new();
        let mut by_alias = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            by_type.entry(normalize_type(&rule.source_type)).or_insert(idx);
            if let Some(alias) = rule.alias.as_deref() {
                let alias = normalize_type(alias);
                if !alias.is_empty() {
                    by_alias.entry(alias).or_insert(idx);
                }
            }
        }
        Self {
            rules,
            by_type,
            by_alias,
        }
    }

    pub fn resolve(&self, volume_type: &str) -> Option<&MigrationRule> {
        let key = normalize_type(volume_type);
        if key.is_empty() {
            return None;
        }
        self.by_type
            .get(&key)
            .or_else(|| self.by_alias.get(&key))
            .map(|idx| &self.rules[*idx])
    }

    /// Ordered destination types for `volume_type`; empty means "no preference", whether no
    /// rule matched or the matching rule lists only blank types.
    pub fn preferred_destinations(&self, volume_type: &str) -> &[String] {
        self.resolve(volume_type)
            .filter(|rule| rule.has_preferences())
            .map(|rule| rule.destinations.as_slice())
            .unwrap_or(&[])
    }
}
