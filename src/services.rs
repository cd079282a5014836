//! Background service lifecycle management.
//!
//! `BackgroundServices` runs the startup restore and spawns the block-event
//! counter, in that order, before the command socket starts accepting work.

use std::sync::Arc;

use crate::counter::BlockCounter;
use crate::engine::RuleEngine;
use crate::platform::RuleSink;
use crate::store::StateStore;

/// Starts everything that runs besides the command server.
///
/// Services start in dependency order:
/// 1. Startup restore — re-applies the persisted blocking state so the
///    backend rule set matches the store before any command arrives.
/// 2. Block-event counter — consumes rule-match notifications; independent
///    of the engine queue, talks only to the store.
pub struct BackgroundServices;

impl BackgroundServices {
    pub async fn start(engine: &Arc<RuleEngine>, store: &Arc<StateStore>, sink: &dyn RuleSink) {
        // 1. Restore — must finish before the socket opens.
        if let Err(e) = engine.restore().await {
            tracing::warn!("Failed to restore persisted blocking state: {e}");
        }

        // 2. Counter.
        BlockCounter::spawn(Arc::clone(store), sink.subscribe_matches());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::BlockingState;
    use crate::platform::{InMemoryRuleSink, Indicator, LogIndicator};
    use crate::store::StateStore;

    #[tokio::test]
    async fn test_start_restores_state_and_counts_matches() {
        let sink = Arc::new(InMemoryRuleSink::new());
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        store
            .save_blocking_state(&BlockingState {
                enabled: true,
                domains: vec!["youtube.com".into()],
                whitelist: vec![],
                active_rule_ids: vec![1],
            })
            .unwrap();

        let engine = RuleEngine::new(
            Arc::clone(&sink) as Arc<dyn RuleSink>,
            Arc::clone(&store),
            Arc::new(LogIndicator) as Arc<dyn Indicator>,
        );

        BackgroundServices::start(&engine, &store, sink.as_ref()).await;

        // Restore rebuilt the backend rule set from the persisted domains.
        assert_eq!(sink.rule_count(), 1);

        // A blocked navigation reaches the counter through the store.
        assert!(sink.evaluate("www.youtube.com").is_some());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let (count, _) = store.load_counter().unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_start_with_empty_store_leaves_blocking_off() {
        let sink = Arc::new(InMemoryRuleSink::new());
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let engine = RuleEngine::new(
            Arc::clone(&sink) as Arc<dyn RuleSink>,
            Arc::clone(&store),
            Arc::new(LogIndicator) as Arc<dyn Indicator>,
        );

        BackgroundServices::start(&engine, &store, sink.as_ref()).await;

        assert_eq!(sink.rule_count(), 0);
        assert!(!engine.status().await.unwrap().enabled);
    }
}
