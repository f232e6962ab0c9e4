//! # Statistics & Leaderboard Reporter
//!
//! Read-only projections over the stores for dashboards: corpus completion
//! statistics, per-flag defect totals, and the evaluator leaderboard. All
//! three honor the same optional project scope as the categorizer.

use crate::evaluation::aggregate::ChunkAggregate;
use crate::evaluation::categorize::{categorize_chunks, ready_for_transcription, ReadinessRule};
use crate::evaluation::flags::FlagTotals;
use crate::store::AnnotationStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Corpus-wide chunk counts and completion rate.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkStatistics {
    pub total_chunks: u32,
    pub not_evaluated: u32,
    pub one_evaluation: u32,
    pub two_evaluations: u32,
    pub three_or_more_evaluations: u32,
    pub ready_for_transcription: u32,
    /// Percentage of chunks with at least one evaluation; 0 for an empty corpus
    pub evaluation_completion_rate: f64,
    /// Chunks carrying non-empty ground-truth transcription text
    pub transcribed_chunks: u32,
}

/// Per-flag defect totals across all evaluations in scope.
#[derive(Debug, Clone, Serialize)]
pub struct FlagStatistics {
    #[serde(flatten)]
    pub totals: FlagTotals,
    pub total_evaluations: u32,
    /// Distinct chunks with at least one evaluation
    pub total_evaluated_chunks: u32,
}

/// One evaluator's row on the leaderboard.
///
/// The count equals the number of distinct chunks the evaluator judged,
/// since the store keeps one row per (chunk, evaluator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub evaluator: String,
    pub evaluations_done: u32,
}

/// Compute the corpus statistics for a scope.
pub fn chunk_statistics(
    store: &AnnotationStore,
    scope: Option<Uuid>,
    rule: ReadinessRule,
) -> ChunkStatistics {
    let categories = categorize_chunks(store, scope, None);
    let ready = ready_for_transcription(store, scope, None, rule);

    let not_evaluated = categories.not_evaluated.len() as u32;
    let total_chunks = (categories.not_evaluated.len()
        + categories.one_evaluation.len()
        + categories.two_evaluations.len()
        + categories.three_or_more.len()) as u32;

    let evaluation_completion_rate = if total_chunks == 0 {
        0.0
    } else {
        (total_chunks - not_evaluated) as f64 / total_chunks as f64 * 100.0
    };

    let transcribed_chunks = store
        .list_chunks(scope)
        .iter()
        .filter(|chunk| chunk.is_transcribed())
        .count() as u32;

    ChunkStatistics {
        total_chunks,
        not_evaluated,
        one_evaluation: categories.one_evaluation.len() as u32,
        two_evaluations: categories.two_evaluations.len() as u32,
        three_or_more_evaluations: categories.three_or_more.len() as u32,
        ready_for_transcription: ready.len() as u32,
        evaluation_completion_rate,
        transcribed_chunks,
    }
}

/// Per-flag totals across every evaluation in scope.
pub fn flag_statistics(store: &AnnotationStore, scope: Option<Uuid>) -> FlagStatistics {
    let evaluations = store.list_evaluations(scope);
    let mut totals = FlagTotals::default();
    let mut evaluated_chunks: HashSet<Uuid> = HashSet::new();
    for evaluation in &evaluations {
        totals.add(&evaluation.flags);
        evaluated_chunks.insert(evaluation.chunk_id);
    }
    FlagStatistics {
        totals,
        total_evaluations: evaluations.len() as u32,
        total_evaluated_chunks: evaluated_chunks.len() as u32,
    }
}

/// Group evaluations by evaluator and count them, busiest first.
pub fn leaderboard(store: &AnnotationStore, scope: Option<Uuid>) -> Vec<LeaderboardEntry> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for evaluation in store.list_evaluations(scope) {
        *counts.entry(evaluation.evaluator).or_insert(0) += 1;
    }
    let mut entries: Vec<LeaderboardEntry> = counts
        .into_iter()
        .map(|(evaluator, evaluations_done)| LeaderboardEntry {
            evaluator,
            evaluations_done,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.evaluations_done
            .cmp(&a.evaluations_done)
            .then_with(|| a.evaluator.cmp(&b.evaluator))
    });
    entries
}

/// Aggregate view of one chunk, recomputed from its current evaluations.
pub fn chunk_aggregate(store: &AnnotationStore, chunk_id: Uuid) -> ChunkAggregate {
    ChunkAggregate::from_evaluations(&store.evaluations_for_chunk(chunk_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::flags::{EvaluationFlags, FlagSchemaVersion};
    use crate::store::models::{Gender, Locale};
    use crate::store::{ChunkPatch, EvaluationSubmission, NewChunk};

    const RULE: ReadinessRule = ReadinessRule {
        quorum: 3,
        badness_threshold: 0.3,
    };

    fn seeded_store() -> (AnnotationStore, Uuid) {
        let store = AnnotationStore::new();
        let project = store.insert_project("helpline-2025", None, "admin");
        (store, project.id)
    }

    fn add_chunk(store: &AnnotationStore, project_id: Uuid, name: &str) -> Uuid {
        let (chunk, _) = store.insert_or_get_chunk(
            NewChunk {
                project_id,
                relative_path: format!("chunks/{}.wav", name),
                duration_secs: 5.0,
                gender: Gender::default(),
                locale: Locale::default(),
            },
            "segmenter",
        );
        chunk.id
    }

    fn evaluate(store: &AnnotationStore, chunk_id: Uuid, evaluator: &str, noisy: bool) {
        store
            .upsert_evaluation(
                chunk_id,
                EvaluationSubmission {
                    evaluator: evaluator.to_string(),
                    schema: FlagSchemaVersion::V2,
                    flags: EvaluationFlags {
                        background_noise: noisy,
                        ..Default::default()
                    },
                    notes: None,
                    started_at: None,
                    ended_at: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_empty_corpus_reports_zeroes() {
        let (store, project_id) = seeded_store();
        let stats = chunk_statistics(&store, Some(project_id), RULE);
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.evaluation_completion_rate, 0.0);
        assert_eq!(stats.transcribed_chunks, 0);
    }

    #[test]
    fn test_completion_rate_counts_any_evaluated_chunk() {
        let (store, project_id) = seeded_store();
        let evaluated = add_chunk(&store, project_id, "done");
        add_chunk(&store, project_id, "todo-1");
        add_chunk(&store, project_id, "todo-2");
        add_chunk(&store, project_id, "todo-3");
        evaluate(&store, evaluated, "reviewer-1", false);

        let stats = chunk_statistics(&store, Some(project_id), RULE);
        assert_eq!(stats.total_chunks, 4);
        assert_eq!(stats.not_evaluated, 3);
        assert_eq!(stats.one_evaluation, 1);
        assert!((stats.evaluation_completion_rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_transcribed_chunks_counts_nonempty_text() {
        let (store, project_id) = seeded_store();
        let chunk_id = add_chunk(&store, project_id, "spoken");
        add_chunk(&store, project_id, "silent");
        store
            .patch_chunk(
                chunk_id,
                ChunkPatch {
                    feature_text: Some("nimefurahi kukutana nawe".to_string()),
                    ..Default::default()
                },
                "transcriber",
            )
            .unwrap();

        let stats = chunk_statistics(&store, Some(project_id), RULE);
        assert_eq!(stats.transcribed_chunks, 1);
    }

    #[test]
    fn test_flag_statistics_totals() {
        let (store, project_id) = seeded_store();
        let first = add_chunk(&store, project_id, "a");
        let second = add_chunk(&store, project_id, "b");
        evaluate(&store, first, "reviewer-1", true);
        evaluate(&store, first, "reviewer-2", false);
        evaluate(&store, second, "reviewer-1", true);

        let stats = flag_statistics(&store, Some(project_id));
        assert_eq!(stats.totals.background_noise, 2);
        assert_eq!(stats.total_evaluations, 3);
        assert_eq!(stats.total_evaluated_chunks, 2);
    }

    /// A resubmission never inflates a leaderboard count: one row per
    /// (chunk, evaluator) means one point per distinct chunk.
    #[test]
    fn test_leaderboard_counts_distinct_chunks() {
        let (store, project_id) = seeded_store();
        let first = add_chunk(&store, project_id, "a");
        let second = add_chunk(&store, project_id, "b");
        evaluate(&store, first, "reviewer-1", false);
        evaluate(&store, first, "reviewer-1", true); // resubmission
        evaluate(&store, second, "reviewer-1", false);
        evaluate(&store, first, "reviewer-2", false);

        let entries = leaderboard(&store, Some(project_id));
        assert_eq!(
            entries,
            vec![
                LeaderboardEntry {
                    evaluator: "reviewer-1".to_string(),
                    evaluations_done: 2,
                },
                LeaderboardEntry {
                    evaluator: "reviewer-2".to_string(),
                    evaluations_done: 1,
                },
            ]
        );
    }
}
