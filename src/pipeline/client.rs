//! # Remote Pipeline Trigger
//!
//! Fire-and-forget notifications to the external GPU service that performs
//! noise reduction, diarization and remote chunking. Each trigger is one
//! JSON POST with a bounded timeout; a non-2xx response or transport error
//! is logged and swallowed — the local write that caused the trigger must
//! never fail or hang because the collaborator is down. Retry policy
//! belongs to the collaborator side or an operator-driven replay.
//!
//! ## Acceptance contract:
//! Any 2xx status counts as acceptance. Callers only advance local state
//! (e.g. marking a source file processed) after acceptance, so a failed
//! trigger leaves the record retriable.

use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Connection settings for the GPU collaborator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Default noise-reduction strength sent with preprocess triggers
    pub noise_reduction: f64,
    /// Whether preprocess should loudness-normalize
    pub normalize: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            request_timeout_secs: 10,
            noise_reduction: 0.3,
            normalize: true,
        }
    }
}

/// The three logical trigger endpoints on the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Preprocess,
    Diarize,
    Chunk,
}

impl PipelineStage {
    fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Preprocess => "preprocess",
            PipelineStage::Diarize => "diarize",
            PipelineStage::Chunk => "chunk",
        }
    }
}

fn stage_url(base_url: &str, stage: PipelineStage) -> String {
    format!("{}/audio/{}/", base_url.trim_end_matches('/'), stage.as_str())
}

/// HTTP client for the three trigger endpoints.
#[derive(Debug, Clone)]
pub struct PipelineClient {
    http: reqwest::Client,
    settings: PipelineSettings,
}

impl PipelineClient {
    pub fn new(settings: PipelineSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self { http, settings })
    }

    /// Ask the collaborator to noise-reduce and normalize a raw recording.
    /// Returns whether the request was accepted.
    pub async fn trigger_preprocess(&self, audio_path: &str, project_id: Uuid) -> bool {
        self.post_stage(
            PipelineStage::Preprocess,
            json!({
                "audio_path": audio_path,
                "project_id": project_id,
                "noise_reduction": self.settings.noise_reduction,
                "normalize": self.settings.normalize,
            }),
        )
        .await
    }

    /// Ask the collaborator to diarize an approved processed recording.
    pub async fn trigger_diarize(&self, audio_path: &str, project_id: Uuid) -> bool {
        self.post_stage(
            PipelineStage::Diarize,
            json!({
                "audio_path": audio_path,
                "project_id": project_id,
            }),
        )
        .await
    }

    /// Ask the collaborator to chunk a diarized recording remotely.
    pub async fn trigger_chunk(&self, audio_path: &str, project_id: Uuid) -> bool {
        self.post_stage(
            PipelineStage::Chunk,
            json!({
                "audio_path": audio_path,
                "project_id": project_id,
            }),
        )
        .await
    }

    async fn post_stage(&self, stage: PipelineStage, payload: serde_json::Value) -> bool {
        let url = stage_url(&self.settings.base_url, stage);
        match self.http.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(stage = stage.as_str(), %url, "pipeline trigger accepted");
                true
            }
            Ok(response) => {
                warn!(
                    stage = stage.as_str(),
                    %url,
                    status = response.status().as_u16(),
                    "pipeline trigger rejected"
                );
                false
            }
            Err(err) => {
                warn!(
                    stage = stage.as_str(),
                    %url,
                    error = %err,
                    "pipeline trigger failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_urls() {
        assert_eq!(
            stage_url("http://gpu:8001", PipelineStage::Preprocess),
            "http://gpu:8001/audio/preprocess/"
        );
        // Trailing slash on the base must not double up.
        assert_eq!(
            stage_url("http://gpu:8001/", PipelineStage::Diarize),
            "http://gpu:8001/audio/diarize/"
        );
        assert_eq!(
            stage_url("http://gpu:8001", PipelineStage::Chunk),
            "http://gpu:8001/audio/chunk/"
        );
    }

    /// An unreachable collaborator is a logged failure, never an error that
    /// propagates to the caller.
    #[tokio::test]
    async fn test_unreachable_collaborator_is_swallowed() {
        let client = PipelineClient::new(PipelineSettings {
            // Reserved TEST-NET address: nothing listens here.
            base_url: "http://192.0.2.1:9".to_string(),
            request_timeout_secs: 1,
            ..Default::default()
        })
        .unwrap();

        let accepted = client
            .trigger_preprocess("/data/audio/raw/call.wav", Uuid::new_v4())
            .await;
        assert!(!accepted);
    }
}
