//! # Evaluation Engine
//!
//! The aggregation and readiness-gating core: versioned defect-flag schema,
//! per-chunk score aggregation, category bucketing with the transcription
//! readiness gate, and the statistics/leaderboard projections.
//!
//! ## Module Organization:
//! - **flags**: the boolean defect-flag set and its schema versions
//! - **aggregate**: per-chunk evaluation counts, flag sums and the score
//! - **categorize**: 0/1/2/3+ buckets and the ready-for-transcription gate
//! - **stats**: corpus statistics, per-flag totals, evaluator leaderboard

pub mod aggregate;
pub mod categorize;
pub mod flags;
pub mod stats;
