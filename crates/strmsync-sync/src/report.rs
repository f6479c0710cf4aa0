//! Run summaries
//!
//! Every sync run ends with a [`SyncReport`]: per configured pair, counts of
//! created, skipped and failed placeholders and, for full sync, what
//! happened to orphan candidates.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::enumerator::EnumerationStats;
use crate::gate::GateDecision;

/// Which orchestrator produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

/// How processing of one pair ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PairOutcome {
    Completed,
    /// The remote root does not exist; the pair was skipped
    RootNotFound,
    /// The pair cannot be processed in this mode
    Rejected(String),
}

/// A placeholder that could not be generated, or an orphan that could not
/// be removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub path: String,
    pub reason: String,
}

/// Why cleanup did not consider any candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupSkip {
    Disabled,
    GenerationFailures,
    EmptyLocalTree,
}

/// Outcome of the orphan cleanup step of a full sync
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionReport {
    /// Orphan placeholders found by the tree diff
    pub candidates: u64,
    /// Placeholders present locally before cleanup
    pub corpus: u64,
    /// `None` for dry runs
    pub decision: Option<GateDecision>,
    pub removed: u64,
    pub related_removed: u64,
    pub dirs_removed: u64,
    pub failed: u64,
    /// First few candidate paths, for dry runs and logs
    pub sample: Vec<String>,
}

/// Counters for one configured pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    /// `local#remote`
    pub pair: String,
    pub outcome: PairOutcome,
    pub created: u64,
    /// Existing placeholders rewritten with new content
    pub updated: u64,
    /// Existing placeholders left as they were
    pub unchanged: u64,
    /// Remote files that did not pass the media filter
    pub skipped: u64,
    pub failed: u64,
    pub failures: Vec<ItemFailure>,
    pub enumeration: Option<EnumerationStats>,
    pub cleanup_skipped: Option<CleanupSkip>,
    pub deletion: Option<DeletionReport>,
}

impl PairReport {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            outcome: PairOutcome::Completed,
            created: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            enumeration: None,
            cleanup_skipped: None,
            deletion: None,
        }
    }

    pub fn with_outcome(pair: impl Into<String>, outcome: PairOutcome) -> Self {
        Self {
            outcome,
            ..Self::new(pair)
        }
    }

    /// Records a per-item failure
    pub fn fail(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }
}

/// Summary of one sync run over all configured pairs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub pairs: Vec<PairReport>,
}

/// Sums over every pair of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failed: u64,
    pub deletion_candidates: u64,
    pub deleted: u64,
}

impl SyncReport {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            duration_ms: 0,
            pairs: Vec::new(),
        }
    }

    pub fn totals(&self) -> ReportTotals {
        self.pairs.iter().fold(ReportTotals::default(), |mut acc, p| {
            acc.created += p.created;
            acc.updated += p.updated;
            acc.unchanged += p.unchanged;
            acc.skipped += p.skipped;
            acc.failed += p.failed;
            if let Some(deletion) = &p.deletion {
                acc.deletion_candidates += deletion.candidates;
                acc.deleted += deletion.removed;
            }
            acc
        })
    }

    /// True when any item failed
    pub fn has_failures(&self) -> bool {
        self.pairs.iter().any(|p| p.failed > 0)
    }
}
