use serde::{Deserialize, Serialize};

use crate::*;

/// Result of scoring one submitted grid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Sensitivity, percent of target cells that were marked.
    pub tpr: f64,
    /// Specificity, percent of non-target cells left unmarked.
    pub tnr: f64,
    pub pass_threshold: f64,
    pub pass: bool,
    /// Set when one of the rates had nothing to measure and was taken as satisfied.
    pub degeneracy: Option<Degeneracy>,
}

/// Minimum percentage both rates must reach, rising with every attempt already made.
pub fn pass_threshold(policy: &Policy, attempts: u32) -> f64 {
    let penalty = policy.retry_penalty_rate * f64::from(attempts);
    (policy.base_accepted_score_percent + penalty).min(100.0)
}

/// Percentage of `hits` in `total`; an empty set cannot be failed and counts as 100.
fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * hits as f64 / total as f64
    }
}

/// Scores the current marks of `challenge` given how many attempts were made before.
pub fn score(challenge: &Challenge, attempts: u32, policy: &Policy) -> Verdict {
    let positives = challenge.positives().count();
    let negatives = challenge.negatives().count();
    let true_positives = challenge.positives().filter(|cell| cell.marked).count();
    let true_negatives = challenge.negatives().filter(|cell| !cell.marked).count();

    let tpr = rate(true_positives, positives);
    let tnr = rate(true_negatives, negatives);
    let pass_threshold = pass_threshold(policy, attempts);
    let degeneracy = challenge.degeneracy();
    if let Some(degeneracy) = degeneracy {
        log::debug!("Scoring degenerate challenge: {:?}", degeneracy);
    }

    Verdict {
        tpr,
        tnr,
        pass_threshold,
        pass: tpr >= pass_threshold && tnr >= pass_threshold,
        degeneracy,
    }
}
