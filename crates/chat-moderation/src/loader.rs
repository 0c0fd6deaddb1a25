use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::schema::ModerationPolicy;
use crate::strategy::StrategyKind;

/// Load a [`ModerationPolicy`] from a YAML file on disk.
pub fn load_policy(path: impl AsRef<Path>) -> Result<ModerationPolicy> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read moderation policy: {}", path.display()))?;
    load_policy_from_str(&contents)
        .with_context(|| format!("failed to parse moderation policy: {}", path.display()))
}

/// Parse, normalise and validate a [`ModerationPolicy`] from a YAML string.
pub fn load_policy_from_str(yaml: &str) -> Result<ModerationPolicy> {
    let mut policy: ModerationPolicy =
        serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    normalise(&mut policy);
    validate(&policy)?;
    Ok(policy)
}

/// Trim list entries and drop blanks.
fn normalise(policy: &mut ModerationPolicy) {
    for list in [
        &mut policy.replacement_words,
        &mut policy.strict_words,
        &mut policy.warning_words,
    ] {
        list.iter_mut().for_each(|w| *w = w.trim().to_string());
        list.retain(|w| !w.is_empty());
    }
}

fn validate(policy: &ModerationPolicy) -> Result<()> {
    if policy.version != "1.0" {
        bail!(
            "unsupported moderation policy version '{}'; only '1.0' is supported",
            policy.version
        );
    }

    if policy.mask.is_empty() {
        bail!("mask must not be empty");
    }

    if policy.composite_order.is_empty() {
        bail!("composite_order must name at least one strategy");
    }

    let mut seen = HashSet::new();
    for kind in &policy.composite_order {
        if *kind == StrategyKind::Composite {
            bail!("composite_order must not contain 'composite'");
        }
        if !seen.insert(kind) {
            bail!("duplicate strategy in composite_order: '{kind}'");
        }
    }

    Ok(())
}
