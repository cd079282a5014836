//! In-process rule backend.
//!
//! Holds the installed rule set behind a single lock so a replacement is
//! observed atomically, and broadcasts a [`RuleMatch`] whenever `evaluate`
//! redirects a navigation. This is the enforcement point an embedding
//! process drives for every outgoing navigation.

use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::config;

use super::{RedirectRule, RuleMatch, RuleSink};

pub struct InMemoryRuleSink {
    rules: Mutex<Vec<RedirectRule>>,
    matches: broadcast::Sender<RuleMatch>,
}

impl InMemoryRuleSink {
    pub fn new() -> Self {
        let (matches, _) = broadcast::channel(config::MATCH_CHANNEL_CAPACITY);
        Self {
            rules: Mutex::new(Vec::new()),
            matches,
        }
    }

    /// Decide whether a navigation to `host` is redirected.
    ///
    /// Fires a match notification when a rule applies and returns the
    /// redirect target. Send errors are ignored; match delivery is
    /// fire-and-forget.
    pub fn evaluate(&self, host: &str) -> Option<String> {
        let host = host.trim().to_ascii_lowercase();
        let rules = self.rules.lock().unwrap();
        let rule = rules.iter().find(|r| {
            pattern_domain(&r.url_filter)
                .is_some_and(|d| host == d || host.ends_with(&format!(".{d}")))
        })?;
        let _ = self.matches.send(RuleMatch {
            rule_id: rule.id,
            domain: host.clone(),
        });
        Some(rule.redirect_url.clone())
    }

    /// Number of rules currently installed.
    pub fn rule_count(&self) -> usize {
        self.rules.lock().unwrap().len()
    }
}

impl Default for InMemoryRuleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RuleSink for InMemoryRuleSink {
    async fn list_rules(&self) -> anyhow::Result<Vec<RedirectRule>> {
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn replace_rules(
        &self,
        remove_ids: Vec<u32>,
        add: Vec<RedirectRule>,
    ) -> anyhow::Result<()> {
        // Removal and installation happen under one lock acquisition, so no
        // reader ever observes the set with neither old nor new rules.
        let mut rules = self.rules.lock().unwrap();
        rules.retain(|r| !remove_ids.contains(&r.id));
        rules.extend(add);
        Ok(())
    }

    fn subscribe_matches(&self) -> broadcast::Receiver<RuleMatch> {
        self.matches.subscribe()
    }
}

/// Extract the domain out of a `*://*.{domain}/*` filter.
fn pattern_domain(url_filter: &str) -> Option<&str> {
    url_filter.strip_prefix("*://*.")?.strip_suffix("/*")
}
