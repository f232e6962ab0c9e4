//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_EVALUATION_QUORUM, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impls)
//!
//! The evaluation thresholds live here on purpose: the deployment history
//! disagrees on both the quorum size and the badness cutoff, so neither is
//! a constant in code.

use crate::evaluation::categorize::ReadinessRule;
use crate::pipeline::{PipelineSettings, StorageSettings};
use crate::segmenter::SegmenterSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration containing all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageSettings,
    pub evaluation: EvaluationConfig,
    pub segmenter: SegmenterSettings,
    pub pipeline: PipelineSettings,
}

/// Server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// The readiness-gate knobs (configuration, not constants).
///
/// ## Fields:
/// - `quorum`: distinct evaluations required before readiness is decided
/// - `badness_threshold`: scores at or above this reject the chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub quorum: u32,
    pub badness_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            quorum: 3,
            badness_threshold: 0.3,
        }
    }
}

impl EvaluationConfig {
    pub fn readiness_rule(&self) -> ReadinessRule {
        ReadinessRule {
            quorum: self.quorum,
            badness_threshold: self.badness_threshold,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageSettings::default(),
            evaluation: EvaluationConfig::default(),
            segmenter: SegmenterSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_PORT=3000`: override the listen port
    /// - `APP_EVALUATION_QUORUM=5`: require five evaluations
    /// - `APP_PIPELINE_BASE_URL=http://gpu:8001`: point at the GPU service
    /// - `HOST` / `PORT`: deployment-platform overrides without the prefix
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Special-cased variables used by deployment platforms.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.evaluation.quorum == 0 {
            return Err(anyhow::anyhow!("Evaluation quorum must be at least 1"));
        }
        if !(self.evaluation.badness_threshold > 0.0 && self.evaluation.badness_threshold <= 1.0) {
            return Err(anyhow::anyhow!(
                "Badness threshold must be within (0, 1], got {}",
                self.evaluation.badness_threshold
            ));
        }

        if self.segmenter.frame_length_ms == 0 {
            return Err(anyhow::anyhow!("Segmenter frame length must be positive"));
        }
        if self.segmenter.min_chunk_length_ms > self.segmenter.max_chunk_length_ms {
            return Err(anyhow::anyhow!(
                "Minimum chunk length {}ms exceeds maximum {}ms",
                self.segmenter.min_chunk_length_ms,
                self.segmenter.max_chunk_length_ms
            ));
        }
        if self.segmenter.sample_rate == 0 {
            return Err(anyhow::anyhow!("Sample rate must be positive"));
        }

        if self.pipeline.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Pipeline request timeout must be positive"));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON body (runtime config endpoint).
    ///
    /// Only the runtime-tunable sections are updatable here: `server`,
    /// `evaluation` and `pipeline`. Storage mounts and segmenter timing
    /// take effect at startup only.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(evaluation) = partial_config.get("evaluation") {
            if let Some(quorum) = evaluation.get("quorum").and_then(|v| v.as_u64()) {
                self.evaluation.quorum = quorum as u32;
            }
            if let Some(threshold) = evaluation
                .get("badness_threshold")
                .and_then(|v| v.as_f64())
            {
                self.evaluation.badness_threshold = threshold;
            }
        }

        if let Some(pipeline) = partial_config.get("pipeline") {
            if let Some(base_url) = pipeline.get("base_url").and_then(|v| v.as_str()) {
                self.pipeline.base_url = base_url.to_string();
            }
            if let Some(timeout) = pipeline
                .get("request_timeout_secs")
                .and_then(|v| v.as_u64())
            {
                self.pipeline.request_timeout_secs = timeout;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The default configuration is valid and carries the documented
    /// readiness defaults.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.evaluation.quorum, 3);
        assert_eq!(config.evaluation.badness_threshold, 0.3);
        assert_eq!(config.segmenter.min_chunk_length_ms, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.evaluation.quorum = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.evaluation.badness_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.segmenter.min_chunk_length_ms = 9000;
        assert!(config.validate().is_err());
    }

    /// Runtime updates apply only the provided fields and re-validate.
    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"evaluation": {"badness_threshold": 0.5}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.evaluation.badness_threshold, 0.5);
        assert_eq!(config.evaluation.quorum, 3);

        // An update that fails validation is rejected.
        let json = r#"{"evaluation": {"quorum": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }

    #[test]
    fn test_readiness_rule_mirrors_config() {
        let config = EvaluationConfig {
            quorum: 5,
            badness_threshold: 0.4,
        };
        let rule = config.readiness_rule();
        assert_eq!(rule.quorum, 5);
        assert_eq!(rule.badness_threshold, 0.4);
    }
}
