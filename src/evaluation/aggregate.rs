//! # Evaluation Aggregator
//!
//! Collapses the accumulated evaluations of one chunk into a single derived
//! view: how many distinct evaluators judged it, how many of each defect
//! flag they raised, and the normalized quality score. The aggregate is
//! recomputed on every read — nothing here is cached, so the view is always
//! consistent with the current evaluation set.
//!
//! ## Score semantics:
//! `score` is the mean, over evaluations, of each evaluation's raised-flag
//! fraction against its own schema divisor. With a single schema in play
//! this is exactly `total_defect_sum / (evaluation_count * N)`; with mixed
//! historical schemas each record is normalized by the divisor that was in
//! force when it was written. Higher is worse; the range is [0, 1]. A chunk
//! with no evaluations has no score — never a division by zero.

use crate::evaluation::flags::FlagTotals;
use crate::store::models::EvaluationResult;
use std::collections::HashMap;

/// Derived per-chunk evaluation view.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChunkAggregate {
    /// Number of distinct evaluators who judged this chunk
    pub evaluation_count: u32,
    /// Per-flag raise counts across all evaluations
    pub flag_totals: FlagTotals,
    /// Sum of raised flags across all evaluations and all flags
    pub total_defect_sum: u32,
    /// Normalized defect rate in [0, 1]; `None` when nothing was evaluated
    pub score: Option<f64>,
}

impl ChunkAggregate {
    /// Aggregate over the evaluations of one chunk.
    ///
    /// The store already guarantees one row per (chunk, evaluator), but the
    /// count is still taken over distinct evaluators so a duplicated input
    /// row can never inflate it; the most recently updated row per evaluator
    /// wins.
    pub fn from_evaluations(evaluations: &[EvaluationResult]) -> Self {
        let mut latest_per_evaluator: HashMap<&str, &EvaluationResult> = HashMap::new();
        for result in evaluations {
            latest_per_evaluator
                .entry(result.evaluator.as_str())
                .and_modify(|held| {
                    if result.audit.updated_at > held.audit.updated_at {
                        *held = result;
                    }
                })
                .or_insert(result);
        }

        let evaluation_count = latest_per_evaluator.len() as u32;
        let mut flag_totals = FlagTotals::default();
        let mut fraction_sum = 0.0;
        for result in latest_per_evaluator.values() {
            flag_totals.add(&result.flags);
            fraction_sum += result.flags.defect_fraction(result.schema);
        }

        let score = if evaluation_count == 0 {
            None
        } else {
            Some(fraction_sum / evaluation_count as f64)
        };

        Self {
            evaluation_count,
            total_defect_sum: flag_totals.total(),
            flag_totals,
            score,
        }
    }
}
