//! # Record Types
//!
//! Entity definitions for the annotation pipeline: projects, source audio
//! files moving through the preprocessing stages, the audio chunks cut from
//! cleaned recordings, and the per-evaluator evaluation results.
//!
//! ## Common shape:
//! Every entity carries an opaque `Uuid` identity plus audit fields
//! (`created_by`/`updated_by` user tags and UTC timestamps). Identity is
//! assigned by the store at insert time and never reused.

use crate::evaluation::flags::{EvaluationFlags, FlagSchemaVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit fields shared by every stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    /// Fresh audit block for a record being created by `user`.
    pub fn new(user: &str) -> Self {
        let now = Utc::now();
        Self {
            created_by: user.to_string(),
            updated_by: user.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamp an in-place update by `user`.
    pub fn touch(&mut self, user: &str) {
        self.updated_by = user.to_string();
        self.updated_at = Utc::now();
    }
}

/// Tenancy boundary: every chunk and evaluation belongs to exactly one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Preprocessing stage a source recording is currently in.
///
/// ## Stage Transitions:
/// Raw → Processed → Diarized, each advanced by the GPU collaborator
/// accepting the corresponding trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    /// As uploaded, before noise reduction
    Raw,
    /// Noise-reduced and normalized by the GPU service
    Processed,
    /// Speaker-separated, ready for chunking
    Diarized,
}

/// A source call recording tracked through the remote pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFile {
    pub id: Uuid,
    /// External identifier from the telephony export, unique per file
    pub audio_id: String,
    /// Path relative to the storage root, under the stage subfolder
    pub relative_path: String,
    pub stage: ProcessingStage,
    pub file_size: Option<u64>,
    pub duration_secs: Option<f64>,
    /// Set once the preprocess trigger has been accepted by the collaborator
    pub is_processed: bool,
    /// Reviewer sign-off that the processed audio is usable
    pub is_approved: bool,
    pub project_id: Uuid,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Speaker gender tag carried on a chunk for corpus balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NotSure,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::NotSure
    }
}

/// Language tag for the speech in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Sw,
    Both,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Both
    }
}

/// A short (3-7s) playable sub-clip cut from a cleaned recording.
///
/// ## Lifecycle:
/// Created by the segmenter (or bulk registration) and never deleted.
/// The only fields that may change afterwards are `feature_text` (ground
/// truth transcription), `gender` and `locale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Path relative to the storage root; natural key for insert-or-get
    pub relative_path: String,
    pub duration_secs: f64,
    /// Ground-truth transcription text, once a transcriber has supplied it
    pub feature_text: Option<String>,
    pub gender: Gender,
    pub locale: Locale,
    #[serde(flatten)]
    pub audit: Audit,
}

impl AudioChunk {
    /// Whether a non-empty ground-truth transcription is attached.
    pub fn is_transcribed(&self) -> bool {
        self.feature_text
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One evaluator's stored judgment of one chunk.
///
/// ## Invariant:
/// At most one record exists per (chunk, evaluator) pair — a resubmission
/// replaces the stored flags, notes and timing in place. The store enforces
/// this; see `AnnotationStore::upsert_evaluation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: Uuid,
    pub chunk_id: Uuid,
    pub project_id: Uuid,
    pub evaluator: String,
    pub schema: FlagSchemaVersion,
    pub flags: EvaluationFlags,
    pub notes: Option<String>,
    /// When the evaluator opened the chunk
    pub started_at: Option<DateTime<Utc>>,
    /// When the evaluator submitted
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl EvaluationResult {
    /// Seconds the evaluator spent on the chunk, when both timestamps exist.
    pub fn evaluation_duration_secs(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_touch_updates_stamp_and_user() {
        let mut audit = Audit::new("uploader");
        let created_at = audit.created_at;
        audit.touch("reviewer");

        assert_eq!(audit.created_by, "uploader");
        assert_eq!(audit.updated_by, "reviewer");
        assert_eq!(audit.created_at, created_at);
        assert!(audit.updated_at >= created_at);
    }

    #[test]
    fn test_chunk_transcribed_ignores_whitespace_text() {
        let mut chunk = AudioChunk {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            relative_path: "chunks/call_chunk_0001.wav".to_string(),
            duration_secs: 5.2,
            feature_text: None,
            gender: Gender::default(),
            locale: Locale::default(),
            audit: Audit::new("segmenter"),
        };
        assert!(!chunk.is_transcribed());

        chunk.feature_text = Some("   ".to_string());
        assert!(!chunk.is_transcribed());

        chunk.feature_text = Some("habari yako".to_string());
        assert!(chunk.is_transcribed());
    }

    #[test]
    fn test_evaluation_duration_requires_ordered_timestamps() {
        let start = Utc::now();
        let end = start + chrono::Duration::seconds(42);
        let mut result = EvaluationResult {
            id: Uuid::new_v4(),
            chunk_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            evaluator: "reviewer-1".to_string(),
            schema: FlagSchemaVersion::V2,
            flags: EvaluationFlags::default(),
            notes: None,
            started_at: Some(start),
            ended_at: Some(end),
            audit: Audit::new("reviewer-1"),
        };
        assert_eq!(result.evaluation_duration_secs(), Some(42.0));

        // Clock skew between client timestamps must not produce a negative duration.
        result.ended_at = Some(start - chrono::Duration::seconds(5));
        assert_eq!(result.evaluation_duration_secs(), None);
    }
}
