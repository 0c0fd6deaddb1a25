use std::sync::Arc;

use crate::strategy::ModerationStrategy;
use crate::verdict::{ModerationAction, ModerationVerdict};

/// Runs an ordered chain of strategies.
///
/// Precedence:
/// 1. `Block` from any member wins immediately; later members are not run.
/// 2. `Modify` rewrites the text handed to the next member.
/// 3. Otherwise the chain ends in `Allow` whose `modified_message` records
///    every rewrite applied along the way. Publishers still send the
///    original text for an `Allow`.
pub struct CompositeStrategy {
    name: String,
    members: Vec<Arc<dyn ModerationStrategy>>,
}

impl CompositeStrategy {
    pub const NAME: &'static str = "Composite";

    pub fn new(members: Vec<Arc<dyn ModerationStrategy>>) -> Self {
        Self::with_name(Self::NAME, members)
    }

    pub fn with_name(name: impl Into<String>, members: Vec<Arc<dyn ModerationStrategy>>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Names of the members in evaluation order.
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }
}

impl ModerationStrategy for CompositeStrategy {
    fn moderate(&self, text: &str) -> ModerationVerdict {
        let mut current = text.to_string();

        for member in &self.members {
            let verdict = member.moderate(&current);

            match verdict.action {
                ModerationAction::Block => {
                    return ModerationVerdict {
                        strategy_used: self.name.clone(),
                        ..verdict
                    };
                }
                ModerationAction::Modify => current = verdict.modified_message,
                ModerationAction::Allow | ModerationAction::Warn => {}
            }
        }

        ModerationVerdict::new(
            ModerationAction::Allow,
            text,
            current,
            "Message passed all moderation checks",
            0.3,
            self.name.clone(),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}
