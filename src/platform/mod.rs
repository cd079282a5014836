//! Rule-enforcement backends.
//!
//! The engine drives the platform rule subsystem through the [`RuleSink`]
//! trait: list what is installed, replace the installed set in one step, and
//! subscribe to match notifications. `memory` provides the in-process
//! implementation used by the daemon and by tests.

pub mod memory;

pub use memory::InMemoryRuleSink;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A single network-redirect rule installed in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub id: u32,
    pub priority: u32,
    /// Match pattern of the form `*://*.{domain}/*`.
    pub url_filter: String,
    /// Notice-page URL the navigation is redirected to.
    pub redirect_url: String,
}

/// Notification fired when an installed rule matches a navigation attempt.
///
/// At-most-once per navigation, no delivery guarantee across restarts.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub rule_id: u32,
    /// Host of the blocked navigation.
    pub domain: String,
}

/// Interface to the platform rule subsystem consumed by the engine.
///
/// `replace_rules` must behave transactionally: `remove_ids` leave and `add`
/// arrive in a single step, never exposing a window where neither the old nor
/// the new set is installed.
#[async_trait::async_trait]
pub trait RuleSink: Send + Sync {
    /// List the rules currently installed by this daemon.
    async fn list_rules(&self) -> anyhow::Result<Vec<RedirectRule>>;

    /// Remove `remove_ids` and install `add` as one replacement.
    async fn replace_rules(&self, remove_ids: Vec<u32>, add: Vec<RedirectRule>)
        -> anyhow::Result<()>;

    /// Subscribe to rule-match notifications.
    fn subscribe_matches(&self) -> broadcast::Receiver<RuleMatch>;
}

/// Outbound notification updating the user-visible blocking indicator.
///
/// The menu-bar shell consuming this is an external collaborator; the engine
/// only emits the transition on every enable/disable.
pub trait Indicator: Send + Sync {
    fn set_blocking(&self, active: bool);
}

/// Default indicator: records the transition in the log.
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set_blocking(&self, active: bool) {
        if active {
            tracing::info!("Indicator: blocking active");
        } else {
            tracing::info!("Indicator: blocking off");
        }
    }
}
