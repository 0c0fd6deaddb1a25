use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::schema::ModerationPolicy;
use crate::strategy::{ModerationStrategy, StrategyKind};
use crate::verdict::{ModerationAction, ModerationVerdict};

/// Counters reported by [`ModerationContext::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationStats {
    pub blocked_messages: u64,
    pub modified_messages: u64,
    pub warning_messages: u64,
    /// Name of the strategy active when the stats were taken.
    pub strategy: String,
}

/// Owns the active moderation strategy and the verdict counters.
///
/// The strategy can be swapped at any time. A moderation call clones the
/// current `Arc` under the read lock and evaluates outside it, so each call
/// sees exactly one strategy instance from start to finish. A call racing a
/// swap may use either the old or the new strategy.
pub struct ModerationContext {
    policy: ModerationPolicy,
    active: RwLock<Arc<dyn ModerationStrategy>>,
    blocked: AtomicU64,
    modified: AtomicU64,
    warned: AtomicU64,
}

impl ModerationContext {
    /// Create a context running the policy's `default_strategy`.
    pub fn new(policy: ModerationPolicy) -> Self {
        let kind = policy.default_strategy;
        Self::with_strategy(policy, kind)
    }

    pub fn with_strategy(policy: ModerationPolicy, kind: StrategyKind) -> Self {
        let active = policy.build(kind);
        Self {
            policy,
            active: RwLock::new(active),
            blocked: AtomicU64::new(0),
            modified: AtomicU64::new(0),
            warned: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &ModerationPolicy {
        &self.policy
    }

    /// The strategy that the next call to [`moderate`](Self::moderate) will use.
    pub fn current(&self) -> Arc<dyn ModerationStrategy> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run `text` through the active strategy and update the counters.
    pub fn moderate(&self, text: &str) -> ModerationVerdict {
        let strategy = self.current();
        let verdict = strategy.moderate(text);

        match verdict.action {
            ModerationAction::Block => {
                self.blocked.fetch_add(1, Ordering::Relaxed);
            }
            ModerationAction::Modify => {
                self.modified.fetch_add(1, Ordering::Relaxed);
            }
            ModerationAction::Warn => {
                self.warned.fetch_add(1, Ordering::Relaxed);
            }
            ModerationAction::Allow => {}
        }

        debug!(
            strategy = %verdict.strategy_used,
            action = %verdict.action,
            confidence = verdict.confidence,
            reason = %verdict.reason,
            "message moderated"
        );

        verdict
    }

    /// Replace the active strategy with a fresh instance of `kind`.
    pub fn set_strategy(&self, kind: StrategyKind) {
        self.replace(self.policy.build(kind));
    }

    /// Install a caller-built strategy.
    pub fn replace(&self, strategy: Arc<dyn ModerationStrategy>) {
        let name = strategy.name().to_string();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = strategy;
        info!(strategy = %name, "moderation strategy changed");
    }

    pub fn strategy_name(&self) -> String {
        self.current().name().to_string()
    }

    pub fn stats(&self) -> ModerationStats {
        ModerationStats {
            blocked_messages: self.blocked.load(Ordering::Relaxed),
            modified_messages: self.modified.load(Ordering::Relaxed),
            warning_messages: self.warned.load(Ordering::Relaxed),
            strategy: self.strategy_name(),
        }
    }
}

impl Default for ModerationContext {
    fn default() -> Self {
        Self::new(ModerationPolicy::default())
    }
}
