//! # Remote Pipeline Boundary
//!
//! Everything that crosses the boundary to the external GPU service: the
//! shared-filesystem layout both tiers read from, and the fire-and-forget
//! trigger client that kicks off preprocessing, diarization and remote
//! chunking.

pub mod client;
pub mod paths;

pub use client::{PipelineClient, PipelineSettings};
pub use paths::{StorageFolder, StorageLayout, StorageSettings};
