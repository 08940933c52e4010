// Status Aggregation
// Leaf/result status enum and the precedence rules used to derive aggregates

use crate::tree::node::Leaf;
use crate::tree::Tree;

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Execution status of one result key on a leaf, or of an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Untested,
    Running,
    Pass,
    Fail,
    Skipped,
    /// Only ever produced by aggregation
    Partial,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Untested,
        Status::Running,
        Status::Pass,
        Status::Fail,
        Status::Skipped,
        Status::Partial,
    ];

    /// Whether a leaf task may end in this status
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Pass | Status::Fail)
    }

    /// Whether this status may be set directly on a leaf by a caller
    pub fn is_manual(self) -> bool {
        matches!(
            self,
            Status::Untested | Status::Pass | Status::Fail | Status::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Untested => "untested",
            Status::Running => "running",
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Skipped => "skipped",
            Status::Partial => "partial",
        }
    }

    /// Single-character marker for terminal output
    pub fn symbol(self) -> &'static str {
        match self {
            Status::Untested => "·",
            Status::Running => "…",
            Status::Pass => "✓",
            Status::Fail => "✗",
            Status::Skipped => "-",
            Status::Partial => "~",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "untested" | "idle" => Ok(Status::Untested),
            "running" => Ok(Status::Running),
            "pass" | "passed" => Ok(Status::Pass),
            "fail" | "failed" => Ok(Status::Fail),
            "skip" | "skipped" => Ok(Status::Skipped),
            "partial" => Ok(Status::Partial),
            _ => Err(format!(
                "Unknown status '{}'. Valid statuses: untested, running, pass, fail, skipped, partial",
                s
            )),
        }
    }
}

/// Combine statuses under the aggregation precedence.
///
/// Rules are evaluated on the set of distinct values, first match wins:
/// all untested, all pass, all skipped, all fail, any running, any fail,
/// otherwise partial. An empty input is untested.
pub fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let seen = statuses.into_iter().fold(0u8, |acc, s| acc | s.bit());
    let only = |status: Status| seen == status.bit();

    if seen == 0 || only(Status::Untested) {
        Status::Untested
    } else if only(Status::Pass) {
        Status::Pass
    } else if only(Status::Skipped) {
        Status::Skipped
    } else if only(Status::Fail) {
        Status::Fail
    } else if seen & Status::Running.bit() != 0 {
        Status::Running
    } else if seen & Status::Fail.bit() != 0 {
        Status::Fail
    } else {
        Status::Partial
    }
}

/// Single status of a leaf derived from all of its result keys
pub fn derived_leaf_status(leaf: &Leaf) -> Status {
    aggregate(leaf.results.values().copied())
}

/// Displayed status of any node; `None` if the id is unknown
pub fn aggregate_status(tree: &Tree, id: &str) -> Option<Status> {
    let leaves = tree.leaves_under(id)?;
    Some(aggregate(leaves.into_iter().map(derived_leaf_status)))
}

/// Status of one result key across a node's leaves; `None` if the id or key is unknown
pub fn aggregate_one_result(tree: &Tree, id: &str, key: &str) -> Option<Status> {
    if !tree.result_keys().iter().any(|k| k.as_str() == key) {
        return None;
    }
    let leaves = tree.leaves_under(id)?;
    Some(aggregate(
        leaves
            .into_iter()
            .map(|leaf| leaf.results.get(key).copied().unwrap_or_default()),
    ))
}

/// Leaf counts per derived status across a whole tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub untested: usize,
    pub running: usize,
    pub pass: usize,
    pub fail: usize,
    pub skipped: usize,
    pub partial: usize,
}

impl SummaryCounts {
    pub fn from_leaves<'a>(leaves: impl IntoIterator<Item = &'a Leaf>) -> Self {
        let mut counts = Self::default();
        for leaf in leaves {
            counts.total += 1;
            match derived_leaf_status(leaf) {
                Status::Untested => counts.untested += 1,
                Status::Running => counts.running += 1,
                Status::Pass => counts.pass += 1,
                Status::Fail => counts.fail += 1,
                Status::Skipped => counts.skipped += 1,
                Status::Partial => counts.partial += 1,
            }
        }
        counts
    }

    /// Leaves that reached a final state
    pub fn done(&self) -> usize {
        self.pass + self.fail + self.skipped
    }

    /// Rounded completion percentage
    pub fn percent_done(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.done() as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// Pass/fail tally for a node badge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    pub pass: usize,
    pub fail: usize,
    pub total: usize,
}

impl NodeCounts {
    pub fn from_leaves<'a>(leaves: impl IntoIterator<Item = &'a Leaf>) -> Self {
        let mut counts = Self::default();
        for leaf in leaves {
            counts.total += 1;
            match derived_leaf_status(leaf) {
                Status::Pass => counts.pass += 1,
                Status::Fail => counts.fail += 1,
                _ => {}
            }
        }
        counts
    }

    pub fn badge(&self) -> String {
        if self.fail > 0 {
            format!("{}✗ {}✓", self.fail, self.pass)
        } else {
            format!("{}/{}", self.pass, self.total)
        }
    }
}
