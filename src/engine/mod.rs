//! The rule engine: owns the authoritative blocking state and applies
//! rule-set transitions against the rule backend.
//!
//! Every mutation runs under a single async mutex held for the whole
//! operation, including persistence. One rebuild at a time; `active_rule_ids`
//! never diverges from `domains` mid-flight. Rule removal never trusts the
//! id cache alone: each transition removes the union of what the backend
//! reports installed and what the state tracks.

pub mod compiler;
pub mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

use crate::config;
use crate::counter;
use crate::error::AppError;
use crate::platform::{Indicator, RuleSink};
use crate::store::StateStore;

use state::{BlockingState, PendingPause};

/// Read-only snapshot returned to the agent by `get_status`.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub domains: Vec<String>,
    pub whitelist_size: usize,
    pub blocks_today: u64,
    pub pause_remaining: Option<Duration>,
}

struct EngineInner {
    state: BlockingState,
    pending_pause: Option<PendingPause>,
    pause_generation: u64,
}

pub struct RuleEngine {
    inner: Mutex<EngineInner>,
    sink: Arc<dyn RuleSink>,
    store: Arc<StateStore>,
    indicator: Arc<dyn Indicator>,
}

impl RuleEngine {
    pub fn new(
        sink: Arc<dyn RuleSink>,
        store: Arc<StateStore>,
        indicator: Arc<dyn Indicator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                state: BlockingState::default(),
                pending_pause: None,
                pause_generation: 0,
            }),
            sink,
            store,
            indicator,
        })
    }

    /// Validate `domains` and install redirect rules for them, replacing
    /// whatever rule set is active. Returns the number of rules installed.
    pub async fn enable_blocking(&self, domains: Vec<String>) -> Result<usize, AppError> {
        let domains = compiler::normalize_domains(&domains)?;
        let mut inner = self.inner.lock().await;
        inner.pending_pause = None;
        self.apply_enable(&mut inner, domains).await
    }

    /// Remove every installed rule and mark blocking off. The domain list is
    /// kept so a later enable can reuse it.
    pub async fn disable_blocking(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        inner.pending_pause = None;
        self.apply_disable(&mut inner).await
    }

    /// Replace the domain list. Rebuilds the backend rule set only while
    /// enabled; otherwise just persists the new list. Returns the total
    /// number of domains now on the list.
    pub async fn update_blocklist(&self, domains: Vec<String>) -> Result<usize, AppError> {
        let domains = compiler::normalize_domains(&domains)?;
        let mut inner = self.inner.lock().await;
        if inner.state.enabled {
            self.apply_enable(&mut inner, domains).await?;
        } else {
            inner.state.domains = domains;
            self.persist(&inner.state);
            tracing::info!("Blocklist updated to {} domains while disabled", inner.state.domains.len());
        }
        Ok(inner.state.domains.len())
    }

    /// Disable blocking now and schedule an automatic re-enable with the
    /// current domain list. Returns the scheduled delay.
    pub async fn pause_for(self: &Arc<Self>, minutes: u64) -> Result<Duration, AppError> {
        if minutes == 0 || minutes > config::MAX_PAUSE_MINUTES {
            return Err(AppError::InvalidInput(format!(
                "pause minutes must be between 1 and {}",
                config::MAX_PAUSE_MINUTES
            )));
        }
        let mut inner = self.inner.lock().await;
        let previous_domains = inner.state.domains.clone();
        self.apply_disable(&mut inner).await?;

        let delay = Duration::from_secs(minutes * 60);
        inner.pause_generation += 1;
        let generation = inner.pause_generation;
        inner.pending_pause = Some(PendingPause {
            resume_at: Instant::now() + delay,
            previous_domains,
            generation,
        });

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.resume_from_pause(generation).await;
        });

        tracing::info!("Protection paused for {minutes} minutes");
        Ok(delay)
    }

    /// Notice-page callback: exempt a domain from future rule generation.
    /// Installed rules are untouched until the next rebuild. Returns the
    /// whitelist size.
    pub async fn add_to_whitelist(&self, domain: String) -> Result<usize, AppError> {
        let domain = compiler::normalize_domain(&domain)?;
        let mut inner = self.inner.lock().await;
        if !inner.state.whitelist.contains(&domain) {
            inner.state.whitelist.push(domain.clone());
            self.persist(&inner.state);
            tracing::info!("Whitelisted {domain}");
        }
        Ok(inner.state.whitelist.len())
    }

    /// Snapshot for the agent. The daily counter is normalized against
    /// today's date on read.
    pub async fn status(&self) -> Result<StatusSnapshot, AppError> {
        let inner = self.inner.lock().await;
        let (count, last_reset) = self.store.load_counter()?;
        let today = chrono::Local::now().date_naive();
        let (blocks_today, _) = counter::rollover(count, last_reset, today);
        let now = Instant::now();
        let pause_remaining = inner
            .pending_pause
            .as_ref()
            .filter(|p| p.resume_at > now)
            .map(|p| p.resume_at - now);
        Ok(StatusSnapshot {
            enabled: inner.state.enabled,
            domains: inner.state.domains.clone(),
            whitelist_size: inner.state.whitelist.len(),
            blocks_today,
            pause_remaining,
        })
    }

    /// Re-apply the last persisted state after process start. This is the
    /// only engine trigger not originating from an external command.
    pub async fn restore(&self) -> Result<(), AppError> {
        let persisted = self.store.load_persisted()?;
        let mut inner = self.inner.lock().await;
        inner.state.domains = persisted.domains;
        inner.state.whitelist = persisted.whitelist;
        inner.state.active_rule_ids = persisted.active_rule_ids;

        if persisted.enabled && !inner.state.domains.is_empty() {
            let domains = inner.state.domains.clone();
            let installed = self.apply_enable(&mut inner, domains).await?;
            tracing::info!("Restored blocking state with {installed} rules");
        } else {
            inner.state.enabled = persisted.enabled;
            self.indicator.set_blocking(inner.state.enabled);
            tracing::info!("Restored state: blocking off, {} domains on list", inner.state.domains.len());
        }
        Ok(())
    }

    // ---- Internal transitions (caller holds the engine lock) ----

    async fn apply_enable(
        &self,
        inner: &mut EngineInner,
        domains: Vec<String>,
    ) -> Result<usize, AppError> {
        let rules = compiler::compile(&domains, &inner.state.whitelist);
        let remove_ids = self.removable_rule_ids(&inner.state).await?;
        let added = rules.len();
        let new_ids: Vec<u32> = rules.iter().map(|r| r.id).collect();

        self.call_sink(self.sink.replace_rules(remove_ids, rules))
            .await?;

        inner.state.enabled = true;
        inner.state.domains = domains;
        inner.state.active_rule_ids = new_ids;
        self.persist(&inner.state);
        self.indicator.set_blocking(true);
        tracing::info!("Blocking enabled with {added} rules");
        Ok(added)
    }

    async fn apply_disable(&self, inner: &mut EngineInner) -> Result<(), AppError> {
        let remove_ids = self.removable_rule_ids(&inner.state).await?;
        self.call_sink(self.sink.replace_rules(remove_ids, Vec::new()))
            .await?;

        inner.state.enabled = false;
        inner.state.active_rule_ids.clear();
        self.persist(&inner.state);
        self.indicator.set_blocking(false);
        tracing::info!("Blocking disabled");
        Ok(())
    }

    /// Timer-fire path. A no-op unless the pause that scheduled it is still
    /// the pending one.
    async fn resume_from_pause(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        let pending = match inner.pending_pause.take() {
            Some(p) if p.generation == generation => p,
            other => {
                inner.pending_pause = other;
                return;
            }
        };
        if pending.previous_domains.is_empty() {
            tracing::debug!("Pause expired with no domains to restore");
            return;
        }
        match self.apply_enable(&mut inner, pending.previous_domains).await {
            Ok(installed) => tracing::info!("Protection resumed with {installed} rules"),
            Err(e) => tracing::warn!("Failed to resume blocking after pause: {e}"),
        }
    }

    /// Union of the ids the backend reports installed and the ids tracked in
    /// state, so a stale cache cannot orphan rules.
    async fn removable_rule_ids(&self, state: &BlockingState) -> Result<Vec<u32>, AppError> {
        let listed = self.call_sink(self.sink.list_rules()).await?;
        let mut ids: Vec<u32> = listed.iter().map(|r| r.id).collect();
        for id in &state.active_rule_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        Ok(ids)
    }

    async fn call_sink<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, AppError> {
        let bound = Duration::from_secs(config::PLATFORM_CALL_TIMEOUT_SECS);
        match timeout(bound, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppError::Platform(e.to_string())),
            Err(_) => Err(AppError::Platform(format!(
                "rule backend call exceeded {}s",
                config::PLATFORM_CALL_TIMEOUT_SECS
            ))),
        }
    }

    /// Write-through after a transition already confirmed on the backend.
    /// A store failure keeps the in-memory state; the startup restorer
    /// reconciles the drift on the next boot.
    fn persist(&self, state: &BlockingState) {
        if let Err(e) = self.store.save_blocking_state(state) {
            tracing::warn!("Failed to persist blocking state: {e}");
        }
    }
}
