//! Replays a JSON-lines notification script through the bus.
//!
//! Each non-blank line that does not start with `#` is one step:
//!
//! ```text
//! {"op":"select","member_id":"6f1c..."}
//! {"op":"member","mode":"Add","member":{...}}
//! {"op":"control","kind":"Delete"}
//! ```

use std::io::BufRead;

use anyhow::{Context, Result};
use roster_core::{NotificationBus, RosterCoordinator};
use serde::Deserialize;
use shared::{
    domain::{Member, MemberId},
    protocol::{ControlKind, ControlNotification, MemberMode, MemberNotification},
};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScriptStep {
    Select {
        #[serde(default)]
        member_id: Option<MemberId>,
    },
    Member {
        member: Member,
        mode: String,
    },
    Control {
        kind: String,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Malformed lines abort the replay; unknown modes, kinds and ids are logged and skipped.
pub fn replay(
    coordinator: &RosterCoordinator,
    bus: &NotificationBus,
    input: impl BufRead,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read script line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let step: ScriptStep = serde_json::from_str(line)
            .with_context(|| format!("malformed script step on line {line_no}"))?;

        let applied = match step {
            ScriptStep::Select { member_id } => {
                let selected = coordinator.select(member_id);
                if !selected {
                    warn!(line = line_no, member_id = ?member_id, "selected member not in roster");
                }
                selected
            }
            ScriptStep::Member { member, mode } => match mode.parse::<MemberMode>() {
                Ok(mode) => {
                    bus.send(&MemberNotification { member, mode })
                        .with_context(|| format!("script line {line_no} failed"))?;
                    true
                }
                Err(err) => {
                    warn!(line = line_no, error = %err, "skipping member notification");
                    false
                }
            },
            ScriptStep::Control { kind } => match kind.parse::<ControlKind>() {
                Ok(kind) => {
                    bus.send(&ControlNotification { kind })
                        .with_context(|| format!("script line {line_no} failed"))?;
                    true
                }
                Err(err) => {
                    warn!(line = line_no, error = %err, "skipping control notification");
                    false
                }
            },
        };

        if applied {
            summary.applied += 1;
        } else {
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[path = "tests/script_tests.rs"]
mod tests;
