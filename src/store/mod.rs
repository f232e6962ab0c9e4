//! # Record Stores
//!
//! In-memory stores for projects, source audio files, chunks and evaluation
//! results. Each collection sits behind its own `RwLock` so aggregate reads
//! can run concurrently while writes serialize per collection.
//!
//! ## Key Invariants:
//! - **Evaluation upsert**: at most one `EvaluationResult` per
//!   (chunk, evaluator) pair — enforced by keying the evaluation map on the
//!   pair and replacing in place under one write lock
//! - **Chunk natural key**: `insert_or_get_chunk` serializes on the chunk
//!   map's write lock so parallel chunk-file writers never create duplicate
//!   records for the same physical file
//! - **Project scoping**: every chunk and evaluation belongs to exactly one
//!   project; scoped queries filter on it, and an unknown scope id is the
//!   caller's error to surface

pub mod models;

use models::{
    Audit, AudioChunk, AudioFile, EvaluationResult, Gender, Locale, ProcessingStage, Project,
};
use crate::evaluation::flags::{EvaluationFlags, FlagSchemaVersion};
use crate::pipeline::paths::{restage, StorageFolder};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

/// Fields a chunk registration or segmenter run supplies for a new chunk.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub project_id: Uuid,
    pub relative_path: String,
    pub duration_secs: f64,
    pub gender: Gender,
    pub locale: Locale,
}

/// Mutable subset of a chunk: everything else is frozen after creation.
#[derive(Debug, Clone, Default)]
pub struct ChunkPatch {
    pub feature_text: Option<String>,
    pub gender: Option<Gender>,
    pub locale: Option<Locale>,
}

/// Payload of an evaluation submission, before it is keyed to a chunk.
#[derive(Debug, Clone)]
pub struct EvaluationSubmission {
    pub evaluator: String,
    pub schema: FlagSchemaVersion,
    pub flags: EvaluationFlags,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Store-level failures, mapped to HTTP errors by the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced record does not exist
    NotFound(String),
    /// Natural-key conflict on creation
    Duplicate(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "{} not found", what),
            StoreError::Duplicate(what) => write!(f, "{} already exists", what),
        }
    }
}

/// Shared store for all annotation records.
///
/// ## Thread Safety:
/// Wrapped in `Arc` by `AppState` and shared across request handlers.
/// Reads take read locks; every mutation is a single write-lock critical
/// section, which is what makes the evaluation upsert atomic rather than a
/// read-then-write race.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    projects: RwLock<HashMap<Uuid, Project>>,
    audio_files: RwLock<HashMap<Uuid, AudioFile>>,
    chunks: RwLock<HashMap<Uuid, AudioChunk>>,
    /// Keyed by (chunk id, evaluator) — the upsert invariant lives here
    evaluations: RwLock<HashMap<(Uuid, String), EvaluationResult>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- projects ----

    pub fn insert_project(&self, name: &str, description: Option<String>, user: &str) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
            audit: Audit::new(user),
        };
        self.projects
            .write()
            .unwrap()
            .insert(project.id, project.clone());
        project
    }

    pub fn get_project(&self, id: Uuid) -> Option<Project> {
        self.projects.read().unwrap().get(&id).cloned()
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.projects.read().unwrap().values().cloned().collect()
    }

    /// Validate an optional project scope before running a scoped query.
    ///
    /// Returns the scope unchanged when it resolves (or when no scope was
    /// given); an unknown id is an error so scoped queries never return
    /// partial results against a project that does not exist.
    pub fn resolve_scope(&self, scope: Option<Uuid>) -> Result<Option<Uuid>, StoreError> {
        match scope {
            Some(id) if !self.projects.read().unwrap().contains_key(&id) => {
                Err(StoreError::NotFound(format!("project {}", id)))
            }
            other => Ok(other),
        }
    }

    // ---- source audio files ----

    /// Register a raw recording. `audio_id` is the external natural key and
    /// must be unique across the store.
    pub fn register_audio_file(
        &self,
        audio_id: &str,
        relative_path: &str,
        file_size: Option<u64>,
        duration_secs: Option<f64>,
        project_id: Uuid,
        user: &str,
    ) -> Result<AudioFile, StoreError> {
        let mut files = self.audio_files.write().unwrap();
        if files.values().any(|f| f.audio_id == audio_id) {
            return Err(StoreError::Duplicate(format!("audio file {}", audio_id)));
        }
        let file = AudioFile {
            id: Uuid::new_v4(),
            audio_id: audio_id.to_string(),
            relative_path: relative_path.to_string(),
            stage: ProcessingStage::Raw,
            file_size,
            duration_secs,
            is_processed: false,
            is_approved: false,
            project_id,
            audit: Audit::new(user),
        };
        files.insert(file.id, file.clone());
        Ok(file)
    }

    pub fn get_audio_file(&self, id: Uuid) -> Option<AudioFile> {
        self.audio_files.read().unwrap().get(&id).cloned()
    }

    pub fn list_audio_files(&self, scope: Option<Uuid>) -> Vec<AudioFile> {
        self.audio_files
            .read()
            .unwrap()
            .values()
            .filter(|f| scope.map_or(true, |p| f.project_id == p))
            .cloned()
            .collect()
    }

    /// Record that the preprocess trigger was accepted by the collaborator.
    ///
    /// Only called after a 2xx acknowledgment, so a collaborator failure
    /// leaves the file retriable. The stored relative name follows the file
    /// into the `processed/` folder where the GPU tier writes its output.
    pub fn mark_processed(&self, id: Uuid, user: &str) -> Result<AudioFile, StoreError> {
        self.update_audio_file(id, user, |file| {
            file.is_processed = true;
            file.stage = ProcessingStage::Processed;
            file.relative_path = restage(&file.relative_path, StorageFolder::Processed);
        })
    }

    /// Reviewer sign-off on the processed audio.
    pub fn approve_audio_file(&self, id: Uuid, user: &str) -> Result<AudioFile, StoreError> {
        self.update_audio_file(id, user, |file| {
            file.is_approved = true;
        })
    }

    /// Record the arrival of a diarization result for this file.
    pub fn mark_diarized(&self, id: Uuid, user: &str) -> Result<AudioFile, StoreError> {
        self.update_audio_file(id, user, |file| {
            file.stage = ProcessingStage::Diarized;
            file.relative_path = restage(&file.relative_path, StorageFolder::Diarized);
        })
    }

    fn update_audio_file(
        &self,
        id: Uuid,
        user: &str,
        apply: impl FnOnce(&mut AudioFile),
    ) -> Result<AudioFile, StoreError> {
        let mut files = self.audio_files.write().unwrap();
        let file = files
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("audio file {}", id)))?;
        apply(file);
        file.audit.touch(user);
        Ok(file.clone())
    }

    // ---- chunks ----

    /// Insert a chunk, or return the existing record with the same relative
    /// path. The whole check-and-insert runs under one write lock so
    /// concurrent chunk writers for the same source file cannot race a
    /// duplicate row into the store.
    pub fn insert_or_get_chunk(&self, new: NewChunk, user: &str) -> (AudioChunk, bool) {
        let mut chunks = self.chunks.write().unwrap();
        if let Some(existing) = chunks
            .values()
            .find(|c| c.relative_path == new.relative_path)
        {
            return (existing.clone(), false);
        }
        let chunk = AudioChunk {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            relative_path: new.relative_path,
            duration_secs: new.duration_secs,
            feature_text: None,
            gender: new.gender,
            locale: new.locale,
            audit: Audit::new(user),
        };
        chunks.insert(chunk.id, chunk.clone());
        (chunk, true)
    }

    pub fn get_chunk(&self, id: Uuid) -> Option<AudioChunk> {
        self.chunks.read().unwrap().get(&id).cloned()
    }

    pub fn list_chunks(&self, scope: Option<Uuid>) -> Vec<AudioChunk> {
        self.chunks
            .read()
            .unwrap()
            .values()
            .filter(|c| scope.map_or(true, |p| c.project_id == p))
            .cloned()
            .collect()
    }

    /// Apply the mutable subset of chunk fields; everything else is frozen.
    pub fn patch_chunk(
        &self,
        id: Uuid,
        patch: ChunkPatch,
        user: &str,
    ) -> Result<AudioChunk, StoreError> {
        let mut chunks = self.chunks.write().unwrap();
        let chunk = chunks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("chunk {}", id)))?;
        if let Some(text) = patch.feature_text {
            chunk.feature_text = Some(text);
        }
        if let Some(gender) = patch.gender {
            chunk.gender = gender;
        }
        if let Some(locale) = patch.locale {
            chunk.locale = locale;
        }
        chunk.audit.touch(user);
        Ok(chunk.clone())
    }

    // ---- evaluations ----

    /// Create or replace the evaluation for (chunk, evaluator).
    ///
    /// ## Upsert semantics:
    /// A second submission by the same evaluator for the same chunk fully
    /// replaces the first one's flags, notes and timing, keeping the record
    /// identity and creation audit. Returns the stored record and whether it
    /// was newly created.
    pub fn upsert_evaluation(
        &self,
        chunk_id: Uuid,
        submission: EvaluationSubmission,
    ) -> Result<(EvaluationResult, bool), StoreError> {
        // Resolve the chunk first: the evaluation inherits its project.
        let project_id = self
            .get_chunk(chunk_id)
            .ok_or_else(|| StoreError::NotFound(format!("chunk {}", chunk_id)))?
            .project_id;

        let key = (chunk_id, submission.evaluator.clone());
        let mut evaluations = self.evaluations.write().unwrap();
        match evaluations.get_mut(&key) {
            Some(existing) => {
                existing.schema = submission.schema;
                existing.flags = submission.flags;
                existing.notes = submission.notes;
                existing.started_at = submission.started_at;
                existing.ended_at = submission.ended_at;
                existing.audit.touch(&submission.evaluator);
                Ok((existing.clone(), false))
            }
            None => {
                let result = EvaluationResult {
                    id: Uuid::new_v4(),
                    chunk_id,
                    project_id,
                    evaluator: submission.evaluator.clone(),
                    schema: submission.schema,
                    flags: submission.flags,
                    notes: submission.notes,
                    started_at: submission.started_at,
                    ended_at: submission.ended_at,
                    audit: Audit::new(&submission.evaluator),
                };
                evaluations.insert(key, result.clone());
                Ok((result, true))
            }
        }
    }

    /// All evaluations of one chunk, one per distinct evaluator.
    pub fn evaluations_for_chunk(&self, chunk_id: Uuid) -> Vec<EvaluationResult> {
        self.evaluations
            .read()
            .unwrap()
            .values()
            .filter(|e| e.chunk_id == chunk_id)
            .cloned()
            .collect()
    }

    pub fn list_evaluations(&self, scope: Option<Uuid>) -> Vec<EvaluationResult> {
        self.evaluations
            .read()
            .unwrap()
            .values()
            .filter(|e| scope.map_or(true, |p| e.project_id == p))
            .cloned()
            .collect()
    }

    /// Chunk ids the given evaluator has personally evaluated.
    ///
    /// Drives the `evaluated_by_user` field of category listings — it must
    /// come from the requester's own rows, never from the anonymous count.
    pub fn chunk_ids_evaluated_by(&self, evaluator: &str, scope: Option<Uuid>) -> HashSet<Uuid> {
        self.evaluations
            .read()
            .unwrap()
            .values()
            .filter(|e| e.evaluator == evaluator)
            .filter(|e| scope.map_or(true, |p| e.project_id == p))
            .map(|e| e.chunk_id)
            .collect()
    }

    // ---- counts for health reporting ----

    pub fn record_counts(&self) -> StoreCounts {
        StoreCounts {
            projects: self.projects.read().unwrap().len(),
            audio_files: self.audio_files.read().unwrap().len(),
            chunks: self.chunks.read().unwrap().len(),
            evaluations: self.evaluations.read().unwrap().len(),
        }
    }
}

/// Snapshot of store sizes for the health endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StoreCounts {
    pub projects: usize,
    pub audio_files: usize,
    pub chunks: usize,
    pub evaluations: usize,
}
