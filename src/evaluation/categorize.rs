//! # Chunk Categorizer
//!
//! Buckets chunks by how many distinct evaluators have judged them and
//! applies the readiness gate that decides which chunks may be sent for
//! transcription. Everything here is a read-only projection over the store:
//! buckets are recomputed per request from the live evaluation set.
//!
//! ## Readiness gate:
//! A chunk is ready for transcription iff it has reached the evaluation
//! quorum AND its defect score stays below the badness threshold. A chunk
//! past quorum with a score at or above the threshold is "over-evaluated
//! but rejected": it stays visible in statistics and never enters the
//! transcription queue. Both knobs are configuration, not constants — the
//! deployment history disagrees on their values.

use crate::evaluation::aggregate::ChunkAggregate;
use crate::store::models::{AudioChunk, EvaluationResult, Gender, Locale};
use crate::store::AnnotationStore;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// The two configurable knobs of the readiness gate.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessRule {
    /// Minimum distinct evaluations before readiness is decided
    pub quorum: u32,
    /// Scores at or above this are rejected (lower is better)
    pub badness_threshold: f64,
}

impl ReadinessRule {
    /// Apply the gate to one chunk's aggregate.
    pub fn is_ready(&self, aggregate: &ChunkAggregate) -> bool {
        match aggregate.score {
            Some(score) => {
                aggregate.evaluation_count >= self.quorum && score < self.badness_threshold
            }
            None => false,
        }
    }
}

/// One chunk as returned by category and readiness listings.
///
/// Carries the derived evaluation view alongside the chunk fields, plus
/// `evaluated_by_user` relative to the requesting evaluator so clients can
/// skip chunks the requester already judged.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub relative_path: String,
    pub duration_secs: f64,
    pub feature_text: Option<String>,
    pub gender: Gender,
    pub locale: Locale,
    pub evaluation_count: u32,
    pub score: Option<f64>,
    pub evaluated_by_user: bool,
}

/// Category buckets over a (possibly project-scoped) chunk set.
///
/// The buckets are disjoint and, together with `three_or_more`, cover every
/// chunk in scope exactly once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkCategories {
    pub not_evaluated: Vec<ChunkView>,
    pub one_evaluation: Vec<ChunkView>,
    pub two_evaluations: Vec<ChunkView>,
    pub three_or_more: Vec<ChunkView>,
}

/// Group a flat evaluation list by chunk id.
fn group_by_chunk(evaluations: Vec<EvaluationResult>) -> HashMap<Uuid, Vec<EvaluationResult>> {
    let mut grouped: HashMap<Uuid, Vec<EvaluationResult>> = HashMap::new();
    for evaluation in evaluations {
        grouped.entry(evaluation.chunk_id).or_default().push(evaluation);
    }
    grouped
}

/// Build the per-chunk views for a scope, aggregating on the fly.
///
/// `requester` is the evaluator identity the `evaluated_by_user` flag is
/// computed against; pass `None` for anonymous listings.
fn chunk_views(
    store: &AnnotationStore,
    scope: Option<Uuid>,
    requester: Option<&str>,
) -> Vec<(ChunkView, ChunkAggregate)> {
    let grouped = group_by_chunk(store.list_evaluations(scope));
    let own_chunks = requester
        .map(|user| store.chunk_ids_evaluated_by(user, scope))
        .unwrap_or_default();

    let mut views: Vec<(ChunkView, ChunkAggregate)> = store
        .list_chunks(scope)
        .into_iter()
        .map(|chunk| {
            let aggregate = grouped
                .get(&chunk.id)
                .map(|evaluations| ChunkAggregate::from_evaluations(evaluations))
                .unwrap_or_else(|| ChunkAggregate::from_evaluations(&[]));
            let view = view_of(&chunk, &aggregate, own_chunks.contains(&chunk.id));
            (view, aggregate)
        })
        .collect();
    // Stable listing order for clients that page through results.
    views.sort_by(|a, b| a.0.relative_path.cmp(&b.0.relative_path));
    views
}

fn view_of(chunk: &AudioChunk, aggregate: &ChunkAggregate, evaluated_by_user: bool) -> ChunkView {
    ChunkView {
        id: chunk.id,
        project_id: chunk.project_id,
        relative_path: chunk.relative_path.clone(),
        duration_secs: chunk.duration_secs,
        feature_text: chunk.feature_text.clone(),
        gender: chunk.gender,
        locale: chunk.locale,
        evaluation_count: aggregate.evaluation_count,
        score: aggregate.score,
        evaluated_by_user,
    }
}

/// Partition the chunks in scope into the four evaluation-count buckets.
pub fn categorize_chunks(
    store: &AnnotationStore,
    scope: Option<Uuid>,
    requester: Option<&str>,
) -> ChunkCategories {
    let mut categories = ChunkCategories::default();
    for (view, aggregate) in chunk_views(store, scope, requester) {
        match aggregate.evaluation_count {
            0 => categories.not_evaluated.push(view),
            1 => categories.one_evaluation.push(view),
            2 => categories.two_evaluations.push(view),
            _ => categories.three_or_more.push(view),
        }
    }
    categories
}

/// Chunks that pass the readiness gate, i.e. the transcription queue.
pub fn ready_for_transcription(
    store: &AnnotationStore,
    scope: Option<Uuid>,
    requester: Option<&str>,
    rule: ReadinessRule,
) -> Vec<ChunkView> {
    chunk_views(store, scope, requester)
        .into_iter()
        .filter(|(_, aggregate)| rule.is_ready(aggregate))
        .map(|(view, _)| view)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::flags::{EvaluationFlags, FlagSchemaVersion};
    use crate::store::{EvaluationSubmission, NewChunk};

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

    fn evaluate(store: &AnnotationStore, chunk_id: Uuid, evaluator: &str, defects: u32) {
        let flags = EvaluationFlags {
            dual_speaker: defects >= 1,
            speaker_overlap: defects >= 2,
            background_noise: defects >= 3,
            prolonged_silence: defects >= 4,
            not_normal_speech_rate: defects >= 5,
            echo_noise: defects >= 6,
        };
        store
            .upsert_evaluation(
                chunk_id,
                EvaluationSubmission {
                    evaluator: evaluator.to_string(),
                    schema: FlagSchemaVersion::V2,
                    flags,
                    notes: None,
                    started_at: None,
                    ended_at: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_buckets_partition_all_chunks() {
        let (store, project_id) = seeded_store();
        let zero = add_chunk(&store, project_id, "zero");
        let one = add_chunk(&store, project_id, "one");
        let two = add_chunk(&store, project_id, "two");
        let three = add_chunk(&store, project_id, "three");

        evaluate(&store, one, "reviewer-1", 0);
        evaluate(&store, two, "reviewer-1", 0);
        evaluate(&store, two, "reviewer-2", 0);
        for reviewer in ["reviewer-1", "reviewer-2", "reviewer-3"] {
            evaluate(&store, three, reviewer, 0);
        }

        let categories = categorize_chunks(&store, Some(project_id), None);
        assert_eq!(
            categories.not_evaluated.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![zero]
        );
        assert_eq!(categories.one_evaluation.len(), 1);
        assert_eq!(categories.two_evaluations.len(), 1);
        assert_eq!(categories.three_or_more.len(), 1);

        let total = categories.not_evaluated.len()
            + categories.one_evaluation.len()
            + categories.two_evaluations.len()
            + categories.three_or_more.len();
        assert_eq!(total, store.list_chunks(Some(project_id)).len());
    }

    /// Quorum reached with a clean score passes the gate; a later defective
    /// evaluation that pushes the score past the threshold removes the chunk
    /// from the queue on the next read.
    #[test]
    fn test_readiness_gate_follows_score() {
        let (store, project_id) = seeded_store();
        let chunk_id = add_chunk(&store, project_id, "gated");

        evaluate(&store, chunk_id, "reviewer-1", 1);
        evaluate(&store, chunk_id, "reviewer-2", 2);
        evaluate(&store, chunk_id, "reviewer-3", 0);

        // score = 3 / 18 = 0.1667 < 0.3
        let ready = ready_for_transcription(&store, Some(project_id), None, RULE);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, chunk_id);

        // Fourth evaluation, all six flags raised: score = 9 / 24 = 0.375.
        evaluate(&store, chunk_id, "reviewer-4", 6);
        let ready = ready_for_transcription(&store, Some(project_id), None, RULE);
        assert!(ready.is_empty());

        // Still visible in the category buckets as over-evaluated.
        let categories = categorize_chunks(&store, Some(project_id), None);
        assert_eq!(categories.three_or_more.len(), 1);
    }

    #[test]
    fn test_below_quorum_is_never_ready() {
        let (store, project_id) = seeded_store();
        let chunk_id = add_chunk(&store, project_id, "young");
        evaluate(&store, chunk_id, "reviewer-1", 0);
        evaluate(&store, chunk_id, "reviewer-2", 0);

        assert!(ready_for_transcription(&store, Some(project_id), None, RULE).is_empty());
    }

    #[test]
    fn test_evaluated_by_user_reflects_requester_not_count() {
        let (store, project_id) = seeded_store();
        let chunk_id = add_chunk(&store, project_id, "mine");
        evaluate(&store, chunk_id, "reviewer-1", 0);
        evaluate(&store, chunk_id, "reviewer-2", 0);

        let categories = categorize_chunks(&store, Some(project_id), Some("reviewer-1"));
        let view = &categories.two_evaluations[0];
        assert!(view.evaluated_by_user);

        let categories = categorize_chunks(&store, Some(project_id), Some("reviewer-9"));
        let view = &categories.two_evaluations[0];
        assert!(!view.evaluated_by_user, "count alone must not mark the chunk");
    }

    #[test]
    fn test_scope_filters_other_projects_out() {
        let (store, project_id) = seeded_store();
        let other = store.insert_project("other", None, "admin").id;
        add_chunk(&store, project_id, "in-scope");
        add_chunk(&store, other, "out-of-scope");

        let categories = categorize_chunks(&store, Some(project_id), None);
        assert_eq!(categories.not_evaluated.len(), 1);
        assert_eq!(
            categories.not_evaluated[0].relative_path,
            "chunks/in-scope.wav"
        );
    }
}
