//! # Defect Flag Schema
//!
//! Defines the fixed set of boolean defect flags an evaluator can raise
//! against an audio chunk, together with the schema version that was in
//! force when an evaluation was written. The flag set has changed across
//! deployments (seven flags, then six), so the divisor used for score
//! normalization is read from the stored version rather than hardcoded —
//! historical scores must stay reproducible after a schema change.

use serde::{Deserialize, Serialize};

/// Version of the defect-flag schema an evaluation was written under.
///
/// ## Versions:
/// - **V1**: the original seven-flag set (carried `incomplete_sentence`)
/// - **V2**: the current six-flag set (canonical for new submissions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSchemaVersion {
    V1,
    V2,
}

impl Default for FlagSchemaVersion {
    fn default() -> Self {
        FlagSchemaVersion::V2
    }
}

impl FlagSchemaVersion {
    /// Number of boolean flags in this schema version.
    ///
    /// This is the divisor `N` in the score formula
    /// `score = total_defect_sum / (evaluation_count * N)`.
    pub fn flag_count(&self) -> u32 {
        match self {
            FlagSchemaVersion::V1 => 7,
            FlagSchemaVersion::V2 => 6,
        }
    }
}

/// One evaluator's defect judgment of a chunk.
///
/// Each field is an independent boolean: `true` means the evaluator
/// observed that defect in the chunk. All flags false means the chunk
/// sounded clean to this evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFlags {
    /// More than one speaker is audible in the chunk
    #[serde(default)]
    pub dual_speaker: bool,

    /// Speakers talk over each other
    #[serde(default)]
    pub speaker_overlap: bool,

    /// Background noise intrudes on the speech
    #[serde(default)]
    pub background_noise: bool,

    /// The chunk contains a long stretch of silence
    #[serde(default)]
    pub prolonged_silence: bool,

    /// Speech is unusually fast or slow
    #[serde(default)]
    pub not_normal_speech_rate: bool,

    /// Echo or reverberation distorts the speech
    #[serde(default)]
    pub echo_noise: bool,
}

impl EvaluationFlags {
    /// Count of raised flags (defects) in this evaluation.
    pub fn defect_count(&self) -> u32 {
        [
            self.dual_speaker,
            self.speaker_overlap,
            self.background_noise,
            self.prolonged_silence,
            self.not_normal_speech_rate,
            self.echo_noise,
        ]
        .iter()
        .filter(|&&raised| raised)
        .count() as u32
    }

    /// Fraction of flags raised relative to the divisor of `schema`.
    ///
    /// V1 records are scored against their historical seven-flag divisor
    /// even though the dropped flag can no longer be raised.
    pub fn defect_fraction(&self, schema: FlagSchemaVersion) -> f64 {
        self.defect_count() as f64 / schema.flag_count() as f64
    }
}

/// Running per-flag totals across a set of evaluations.
///
/// Used by the aggregator (per chunk) and the statistics reporter
/// (corpus-wide dashboards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlagTotals {
    pub dual_speaker: u32,
    pub speaker_overlap: u32,
    pub background_noise: u32,
    pub prolonged_silence: u32,
    pub not_normal_speech_rate: u32,
    pub echo_noise: u32,
}

impl FlagTotals {
    /// Fold one evaluation's flags into the totals.
    pub fn add(&mut self, flags: &EvaluationFlags) {
        self.dual_speaker += flags.dual_speaker as u32;
        self.speaker_overlap += flags.speaker_overlap as u32;
        self.background_noise += flags.background_noise as u32;
        self.prolonged_silence += flags.prolonged_silence as u32;
        self.not_normal_speech_rate += flags.not_normal_speech_rate as u32;
        self.echo_noise += flags.echo_noise as u32;
    }

    /// Sum across all flags.
    pub fn total(&self) -> u32 {
        self.dual_speaker
            + self.speaker_overlap
            + self.background_noise
            + self.prolonged_silence
            + self.not_normal_speech_rate
            + self.echo_noise
    }
}
