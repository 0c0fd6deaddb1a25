use chat_bus::{BusError, BusMetricsSnapshot, ChatEvent};
use chat_moderation::{ModerationStats, StrategyKind};
use chat_stats::StatsSnapshot;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coordinator::ChatServer;

/// Administrative operations, tagged by `command` for routing from JSON.
///
/// ```json
/// {"command": "set_strategy", "strategy": "strict_blocking"}
/// {"command": "broadcast", "message": "Server restarting in 5 minutes"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdminCommand {
    SetStrategy { strategy: StrategyKind },
    ModerationStats,
    ChatStats,
    Broadcast { message: String },
    ConnectionCount,
    BusMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdminResponse {
    StrategyChanged { strategy: String },
    ModerationStats(ModerationStats),
    ChatStats(StatsSnapshot),
    Broadcast { accepted: bool },
    ConnectionCount { connections: usize },
    BusMetrics(BusMetricsSnapshot),
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("invalid admin command: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AdminCommand {
    pub fn from_json(json: &str) -> Result<Self, AdminError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ChatServer {
    /// Run one administrative command.
    pub fn execute(&self, command: AdminCommand) -> AdminResponse {
        match command {
            AdminCommand::SetStrategy { strategy } => {
                self.set_strategy(strategy);
                AdminResponse::StrategyChanged {
                    strategy: self.inner.moderation.strategy_name(),
                }
            }
            AdminCommand::ModerationStats => AdminResponse::ModerationStats(self.moderation_stats()),
            AdminCommand::ChatStats => AdminResponse::ChatStats(self.chat_stats()),
            AdminCommand::Broadcast { message } => AdminResponse::Broadcast {
                accepted: self.broadcast(message).is_ok(),
            },
            AdminCommand::ConnectionCount => AdminResponse::ConnectionCount {
                connections: self.connection_count(),
            },
            AdminCommand::BusMetrics => AdminResponse::BusMetrics(self.bus_metrics()),
        }
    }

    /// Swap the active moderation strategy. Applies from the next message.
    pub fn set_strategy(&self, kind: StrategyKind) {
        self.inner.moderation.set_strategy(kind);
    }

    pub fn moderation_stats(&self) -> ModerationStats {
        self.inner.moderation.stats()
    }

    pub fn chat_stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Send a system message to every connected client.
    pub fn broadcast(&self, message: impl Into<String>) -> Result<(), BusError> {
        let message = message.into();
        info!(%message, "broadcasting system message");
        self.inner
            .bus
            .publish(ChatEvent::system(message).with_attribute("system_message", true))
    }

    pub fn bus_metrics(&self) -> BusMetricsSnapshot {
        self.inner.bus.metrics().snapshot()
    }
}
