//! # Storage Layout
//!
//! Audio files live under a shared filesystem root with fixed subfolder
//! conventions. The same files are visible through two mount points — one
//! for this web tier and one for the GPU tier — differing only by path
//! prefix, so both views are computed from the one stored relative name.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fixed stage subfolders under the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFolder {
    Raw,
    Processed,
    Diarized,
    Chunks,
}

impl StorageFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageFolder::Raw => "raw",
            StorageFolder::Processed => "processed",
            StorageFolder::Diarized => "diarized",
            StorageFolder::Chunks => "chunks",
        }
    }
}

/// Recompute a stored relative name after the GPU tier moves the file into
/// another stage folder. Only the folder prefix changes; the file name is
/// preserved.
pub fn restage(relative: &str, folder: StorageFolder) -> String {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    format!("{}/{}", folder.as_str(), file_name)
}

/// Mount configuration for the shared audio filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Mount point as seen by this service
    pub web_root: String,
    /// Mount point as seen by the GPU service (prefix of collaborator paths)
    pub gpu_root: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            web_root: "/mnt/audio".to_string(),
            gpu_root: "/data/audio".to_string(),
        }
    }
}

/// Deterministic path computation over both mount views.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    settings: StorageSettings,
}

impl StorageLayout {
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }

    /// The stored relative name for a file in a stage folder,
    /// e.g. `raw/AUDIO123.wav`.
    pub fn relative_path(folder: StorageFolder, file_name: &str) -> String {
        format!("{}/{}", folder.as_str(), file_name)
    }

    /// Local filesystem path for a stored relative name.
    pub fn web_path(&self, relative: &str) -> PathBuf {
        Path::new(&self.settings.web_root).join(relative)
    }

    /// Collaborator-visible path for a stored relative name. Always
    /// forward-slash separated: it travels inside a JSON payload, not to
    /// the local filesystem.
    pub fn gpu_path(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.settings.gpu_root.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Local directory chunk files are written into.
    pub fn chunks_dir(&self) -> PathBuf {
        Path::new(&self.settings.web_root).join(StorageFolder::Chunks.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StorageLayout {
        StorageLayout::new(StorageSettings {
            web_root: "/mnt/audio".to_string(),
            gpu_root: "/data/audio/".to_string(),
        })
    }

    #[test]
    fn test_relative_path_uses_stage_folder() {
        assert_eq!(
            StorageLayout::relative_path(StorageFolder::Raw, "AUDIO123.wav"),
            "raw/AUDIO123.wav"
        );
        assert_eq!(
            StorageLayout::relative_path(StorageFolder::Chunks, "call_chunk_0001.wav"),
            "chunks/call_chunk_0001.wav"
        );
    }

    /// Both mount views must come from the one stored relative name.
    #[test]
    fn test_web_and_gpu_views_share_relative_name() {
        let relative = StorageLayout::relative_path(StorageFolder::Processed, "call.wav");
        let layout = layout();
        assert_eq!(
            layout.web_path(&relative),
            PathBuf::from("/mnt/audio/processed/call.wav")
        );
        assert_eq!(layout.gpu_path(&relative), "/data/audio/processed/call.wav");
    }

    #[test]
    fn test_chunks_dir_under_web_root() {
        assert_eq!(layout().chunks_dir(), PathBuf::from("/mnt/audio/chunks"));
    }

    #[test]
    fn test_restage_swaps_folder_keeps_name() {
        assert_eq!(
            restage("raw/AUDIO123.wav", StorageFolder::Processed),
            "processed/AUDIO123.wav"
        );
        assert_eq!(
            restage("processed/AUDIO123.wav", StorageFolder::Diarized),
            "diarized/AUDIO123.wav"
        );
        // A bare file name gains the folder prefix.
        assert_eq!(restage("AUDIO123.wav", StorageFolder::Raw), "raw/AUDIO123.wav");
    }
}
