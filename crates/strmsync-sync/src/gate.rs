//! Deletion safety gate
//!
//! Orphan cleanup may only delete in bulk when the deletion is either small
//! relative to the mirror or has been reproduced consistently. For a batch
//! of `N` candidates against `T` existing placeholders:
//!
//! - `N / T` at or below `max_deletion_percent`: approved, history cleared.
//! - Otherwise `N` joins the scope's history (the 3 most recent counts).
//!   With fewer than 3 counts the batch is deferred. With 3, the batch is
//!   approved when their coefficient of variation is at most
//!   `stable_cv_percent` (history cleared) and rejected otherwise
//!   (history kept).

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use strmsync_core::domain::ScopeKey;
use strmsync_core::ports::IStabilityStore;

use crate::SyncError;

/// Counts kept per scope
pub const STABILITY_WINDOW: usize = 3;

const EPSILON: f64 = 1e-9;

/// Verdict for one batch of deletion candidates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateDecision {
    Approved {
        ratio_percent: f64,
        /// Approved by the stability check rather than the ratio
        after_stability: bool,
    },
    /// Not enough history yet
    Deferred { ratio_percent: f64, recorded: usize },
    /// History too noisy
    Rejected { ratio_percent: f64, cv_percent: f64 },
}

impl GateDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateDecision::Approved { .. })
    }
}

/// Population coefficient of variation of `counts`, in percent
///
/// Returns `None` for an empty slice. A zero mean is perfectly stable when
/// every count is zero and infinitely unstable otherwise.
pub fn coefficient_of_variation(counts: &[u64]) -> Option<f64> {
    if counts.is_empty() {
        return None;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
    let variance = counts
        .iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    if mean.abs() < EPSILON {
        return Some(if std_dev < EPSILON { 0.0 } else { f64::INFINITY });
    }
    Some(std_dev / mean * 100.0)
}

/// Evaluates deletion batches against persisted per-scope history
pub struct DeletionGate {
    store: Arc<dyn IStabilityStore>,
    max_deletion_percent: f64,
    stable_cv_percent: f64,
}

impl std::fmt::Debug for DeletionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionGate")
            .field("max_deletion_percent", &self.max_deletion_percent)
            .field("stable_cv_percent", &self.stable_cv_percent)
            .finish()
    }
}

impl DeletionGate {
    pub fn new(
        store: Arc<dyn IStabilityStore>,
        max_deletion_percent: f64,
        stable_cv_percent: f64,
    ) -> Self {
        Self {
            store,
            max_deletion_percent,
            stable_cv_percent,
        }
    }

    /// Decides whether `candidates` deletions out of `corpus` may proceed
    #[tracing::instrument(skip(self, scope), fields(scope = %scope))]
    pub async fn evaluate(
        &self,
        scope: &ScopeKey,
        candidates: u64,
        corpus: u64,
    ) -> Result<GateDecision, SyncError> {
        let ratio_percent = if corpus == 0 {
            0.0
        } else {
            candidates as f64 * 100.0 / corpus as f64
        };

        if ratio_percent <= self.max_deletion_percent {
            self.store
                .clear_counts(scope)
                .await
                .map_err(SyncError::State)?;
            info!(candidates, corpus, ratio_percent, "Deletion under threshold, approved");
            return Ok(GateDecision::Approved {
                ratio_percent,
                after_stability: false,
            });
        }

        let mut history = self
            .store
            .load_counts(scope)
            .await
            .map_err(SyncError::State)?;
        history.push(candidates);
        if history.len() > STABILITY_WINDOW {
            history.drain(..history.len() - STABILITY_WINDOW);
        }

        if history.len() < STABILITY_WINDOW {
            self.store
                .save_counts(scope, &history)
                .await
                .map_err(SyncError::State)?;
            info!(
                candidates,
                corpus,
                ratio_percent,
                recorded = history.len(),
                "Deletion over threshold, deferred pending stability confirmation"
            );
            return Ok(GateDecision::Deferred {
                ratio_percent,
                recorded: history.len(),
            });
        }

        let cv_percent = coefficient_of_variation(&history).unwrap_or(f64::INFINITY);
        if cv_percent <= self.stable_cv_percent {
            self.store
                .clear_counts(scope)
                .await
                .map_err(SyncError::State)?;
            info!(?history, cv_percent, "Deletion count stable, approved");
            Ok(GateDecision::Approved {
                ratio_percent,
                after_stability: true,
            })
        } else {
            self.store
                .save_counts(scope, &history)
                .await
                .map_err(SyncError::State)?;
            warn!(?history, cv_percent, "Deletion count unstable, rejected");
            Ok(GateDecision::Rejected {
                ratio_percent,
                cv_percent,
            })
        }
    }
}
