//! Authoritative in-memory blocking state owned by the rule engine.

use tokio::time::Instant;

/// The engine's record of what is currently blocked.
///
/// `active_rule_ids` always mirrors the rule set last confirmed installed:
/// one id per non-whitelisted domain while enabled, empty while disabled.
#[derive(Debug, Clone, Default)]
pub struct BlockingState {
    pub enabled: bool,
    /// Ordered, lower-cased, deduplicated. Kept across disable so a later
    /// enable can reuse it.
    pub domains: Vec<String>,
    /// Domains exempted from rule generation regardless of `domains`.
    pub whitelist: Vec<String>,
    pub active_rule_ids: Vec<u32>,
}

impl BlockingState {
    /// Structural invariant: rule count equals the non-whitelisted domain
    /// count while enabled, zero while disabled.
    pub fn rule_ids_consistent(&self) -> bool {
        if !self.enabled {
            return self.active_rule_ids.is_empty();
        }
        let expected = self
            .domains
            .iter()
            .filter(|d| !self.whitelist.contains(d))
            .count();
        self.active_rule_ids.len() == expected
    }
}

/// A scheduled automatic resume created by `pause_for`.
///
/// The generation ties a sleeping timer task to the pause that spawned it;
/// an explicit enable/disable clears the pending pause and a later pause
/// bumps the generation, so a stale timer firing is a no-op either way.
#[derive(Debug, Clone)]
pub struct PendingPause {
    pub resume_at: Instant,
    /// Domain list captured when the pause began; restored on resume.
    pub previous_domains: Vec<String>,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_state_requires_no_rule_ids() {
        let state = BlockingState::default();
        assert!(state.rule_ids_consistent());

        let stale = BlockingState {
            active_rule_ids: vec![1],
            ..Default::default()
        };
        assert!(!stale.rule_ids_consistent());
    }

    #[test]
    fn test_enabled_state_counts_whitelisted_domains_out() {
        let state = BlockingState {
            enabled: true,
            domains: vec!["a.com".into(), "b.com".into(), "c.com".into()],
            whitelist: vec!["b.com".into()],
            active_rule_ids: vec![1, 2],
        };
        assert!(state.rule_ids_consistent());

        let wrong = BlockingState {
            active_rule_ids: vec![1, 2, 3],
            ..state
        };
        assert!(!wrong.rule_ids_consistent());
    }
}
