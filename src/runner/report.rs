//! The record a run leaves behind.

use crate::core::StateId;
use crate::cycles::TestPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a single path ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathVerdict {
    Passed,
    Failed { state: StateId, reason: String },
    /// Interrupted by a stop request.
    Stopped,
    NotRun,
}

impl PathVerdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for PathVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("PASSED"),
            Self::Failed { state, reason } => write!(f, "FAILED in state {state}: {reason}"),
            Self::Stopped => f.write_str("STOPPED"),
            Self::NotRun => f.write_str("NOT RUN"),
        }
    }
}

/// How the whole run ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOutcome {
    /// Every path ran and passed.
    Completed,
    /// At least one path failed.
    Failed,
    Stopped,
    /// The run ended before any path was tested.
    Aborted { reason: String },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("all paths passed"),
            Self::Failed => f.write_str("failed"),
            Self::Stopped => f.write_str("stopped by request"),
            Self::Aborted { reason } => write!(f, "aborted ({reason})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathReport {
    /// The path as `S0 --T0--> S1 --T1--> S0`.
    pub path: String,
    pub verdict: PathVerdict,
}

/// Summary of one run, exportable as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub paths: Vec<PathReport>,
}

impl RunReport {
    pub(crate) fn begin(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            outcome: RunOutcome::Completed,
            paths: Vec::new(),
        }
    }

    pub(crate) fn list_paths(&mut self, paths: &[TestPath]) {
        self.paths = paths
            .iter()
            .map(|path| PathReport {
                path: path.to_string(),
                verdict: PathVerdict::NotRun,
            })
            .collect();
    }

    /// True when the run completed and every path passed.
    pub fn all_passed(&self) -> bool {
        self.outcome == RunOutcome::Completed
            && self
                .paths
                .iter()
                .all(|path| path.verdict == PathVerdict::Passed)
    }

    pub fn failed_paths(&self) -> impl Iterator<Item = &PathReport> {
        self.paths.iter().filter(|path| path.verdict.is_failure())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}: {}", self.run_id, self.outcome)?;
        for (index, path) in self.paths.iter().enumerate() {
            writeln!(f, "  path {}: {} [{}]", index + 1, path.path, path.verdict)?;
        }
        Ok(())
    }
}
