//! Workflow phases and the advisory transition table.
//!
//! The table is a flat lookup; it is never enforced. Callers receive a
//! validity flag and decide whether to log it.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named stage of a workflow session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Clarification,
    Discovery,
    Selection,
    Preview,
    Executing,
    Completed,
    Error,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Idle,
        Phase::Clarification,
        Phase::Discovery,
        Phase::Selection,
        Phase::Preview,
        Phase::Executing,
        Phase::Completed,
        Phase::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Clarification => "clarification",
            Phase::Discovery => "discovery",
            Phase::Selection => "selection",
            Phase::Preview => "preview",
            Phase::Executing => "executing",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }

    /// Phases reachable regardless of what an agent declared as supported.
    pub fn always_permitted(self) -> bool {
        matches!(self, Phase::Error | Phase::Executing | Phase::Completed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

/// Row of the transition table for `from`.
pub fn allowed_transitions(from: Phase) -> &'static [Phase] {
    use Phase::{Clarification, Completed, Discovery, Error, Executing, Idle, Preview, Selection};

    match from {
        Idle => &[Clarification, Discovery, Executing, Error],
        Clarification => &[Discovery, Selection, Preview, Executing, Clarification, Error],
        Discovery => &[Selection, Preview, Executing, Clarification, Error],
        Selection => &[Preview, Executing, Selection, Clarification, Error],
        Preview => &[Executing, Clarification, Error],
        Executing => &[Completed, Error],
        Completed => &[],
        Error => &[Idle],
    }
}

/// Check whether `from -> to` is legal.
///
/// When `supported` is given, `to` must also be a declared phase unless it is
/// `error`, `executing` or `completed`. `None` disables the extra check.
pub fn validate_transition(from: Phase, to: Phase, supported: Option<&BTreeSet<Phase>>) -> bool {
    if !allowed_transitions(from).contains(&to) {
        return false;
    }
    match supported {
        Some(declared) => to.always_permitted() || declared.contains(&to),
        None => true,
    }
}

/// Canonical forward order of a workflow (error is off the main line).
pub fn phase_order() -> [Phase; 7] {
    [
        Phase::Idle,
        Phase::Clarification,
        Phase::Discovery,
        Phase::Selection,
        Phase::Preview,
        Phase::Executing,
        Phase::Completed,
    ]
}

pub fn phase_index(phase: Phase) -> Option<usize> {
    phase_order().iter().position(|p| *p == phase)
}
