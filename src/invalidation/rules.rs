//! Invalidation rule set
//!
//! Static defaults plus rules added at runtime, kept sorted by descending
//! priority. Patterns are compiled once when a rule is added.

use regex::Regex;

use crate::cache::CacheNamespace;
use crate::error::{AuditError, Result};
use crate::models::InvalidationRule;

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: InvalidationRule,
    pub pattern: Regex,
}

impl CompiledRule {
    pub fn compile(rule: InvalidationRule) -> Result<Self> {
        let pattern = Regex::new(&rule.url_pattern).map_err(|e| {
            AuditError::InvalidRequest(format!("invalid pattern '{}': {}", rule.url_pattern, e))
        })?;
        Ok(Self { rule, pattern })
    }

    pub fn matches_any<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> bool {
        candidates.into_iter().any(|url| self.pattern.is_match(url))
    }
}

/// Rules shipped with the service.
pub fn default_rules() -> Vec<InvalidationRule> {
    vec![
        InvalidationRule::new(
            r"sitemap.*\.xml$",
            [CacheNamespace::Sitemap],
            "sitemap regenerated",
            10,
        ),
        InvalidationRule::new(
            r"\.(pdf|docx?|xlsx?|pptx?|zip)$",
            [CacheNamespace::Links],
            "downloadable file replaced",
            7,
        ),
        InvalidationRule::new(
            r"/api/",
            [CacheNamespace::Links, CacheNamespace::Reports],
            "API surface changed",
            5,
        ),
        InvalidationRule::new(
            r"/(blog|docs|news)/",
            [CacheNamespace::Links],
            "content section updated",
            3,
        ),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn with_defaults() -> Self {
        let mut set = Self::default();
        for rule in default_rules() {
            // Defaults are known-good patterns
            if let Ok(compiled) = CompiledRule::compile(rule) {
                set.insert(compiled);
            }
        }
        set
    }

    /// Adds a rule, replacing any existing rule with the same pattern.
    pub fn add(&mut self, rule: InvalidationRule) -> Result<()> {
        if rule.affected_namespaces.is_empty() {
            return Err(AuditError::InvalidRequest(
                "rule must affect at least one namespace".to_string(),
            ));
        }
        let compiled = CompiledRule::compile(rule)?;
        self.remove(&compiled.rule.url_pattern);
        self.insert(compiled);
        Ok(())
    }

    pub fn remove(&mut self, url_pattern: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.rule.url_pattern != url_pattern);
        self.rules.len() != before
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> Vec<InvalidationRule> {
        self.rules.iter().map(|r| r.rule.clone()).collect()
    }

    /// Rules matching at least one candidate, highest priority first.
    pub fn matching(&self, candidates: &[&str]) -> Vec<CompiledRule> {
        self.rules
            .iter()
            .filter(|r| r.matches_any(candidates.iter().copied()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    // Stable: equal priorities keep insertion order
    fn insert(&mut self, compiled: CompiledRule) {
        let at = self
            .rules
            .partition_point(|r| r.rule.priority >= compiled.rule.priority);
        self.rules.insert(at, compiled);
    }
}
