//! Per-day block counting with rollover at local midnight.
//!
//! A single consumer task serializes counter updates, so bursts of
//! near-simultaneous match events cannot interleave the read-modify-write.
//! The counter talks only to the store; it never touches the engine queue.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::platform::RuleMatch;
use crate::store::StateStore;

/// Apply the day boundary to a stored counter value.
///
/// Returns the count and reset date valid for `today`: the stored count when
/// it was last reset today, zero otherwise.
pub fn rollover(count: u64, last_reset: Option<NaiveDate>, today: NaiveDate) -> (u64, NaiveDate) {
    match last_reset {
        Some(date) if date == today => (count, today),
        _ => (0, today),
    }
}

pub struct BlockCounter;

impl BlockCounter {
    /// Spawn the counter task consuming rule-match notifications until the
    /// backend drops its sender.
    pub fn spawn(
        store: Arc<StateStore>,
        mut matches: broadcast::Receiver<RuleMatch>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match matches.recv().await {
                    Ok(event) => Self::record(&store, &event, Local::now().date_naive()),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Dropped {missed} block events under load");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn record(store: &StateStore, event: &RuleMatch, today: NaiveDate) {
        let (count, last_reset) = match store.load_counter() {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read block counter: {e}");
                return;
            }
        };
        let (count, date) = rollover(count, last_reset, today);
        let count = count + 1;
        if let Err(e) = store.save_counter(count, date) {
            warn!("Failed to persist block counter: {e}");
            return;
        }
        debug!("Blocked navigation to {} ({count} today)", event.domain);
    }
}
