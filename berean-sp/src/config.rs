//! Configuration for berean-sp
//!
//! Service endpoints, job deadlines, and pipeline tuning knobs, loaded
//! from a TOML file with environment-variable override, on top of the
//! root-folder resolution in berean-common.

use berean_common::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Sermon processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SpConfig {
    /// Transcription service base URL
    #[serde(default = "default_transcription_url")]
    pub transcription_url: String,

    /// Study guide generation service base URL
    #[serde(default = "default_generation_url")]
    pub generation_url: String,

    /// Overall deadline for one remote job (seconds)
    #[serde(default = "default_job_timeout_seconds")]
    pub job_timeout_seconds: u64,

    /// Poll interval while waiting on a remote job (seconds)
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Target display segment duration (seconds)
    #[serde(default = "default_segment_target_seconds")]
    pub segment_target_seconds: f64,

    /// Minimum duration before a sentence break may close a segment
    /// (seconds)
    #[serde(default = "default_segment_min_seconds")]
    pub segment_min_seconds: f64,

    /// Minimum anchor-text similarity to assign a timestamp (0.0 - 1.0)
    #[serde(default = "default_anchor_similarity_threshold")]
    pub anchor_similarity_threshold: f64,
}

fn default_transcription_url() -> String {
    "http://127.0.0.1:5871".to_string()
}

fn default_generation_url() -> String {
    "http://127.0.0.1:5872".to_string()
}

fn default_job_timeout_seconds() -> u64 {
    600
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_segment_target_seconds() -> f64 {
    12.0
}

fn default_segment_min_seconds() -> f64 {
    5.0
}

fn default_anchor_similarity_threshold() -> f64 {
    0.80
}

impl Default for SpConfig {
    fn default() -> Self {
        Self {
            transcription_url: default_transcription_url(),
            generation_url: default_generation_url(),
            job_timeout_seconds: default_job_timeout_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
            segment_target_seconds: default_segment_target_seconds(),
            segment_min_seconds: default_segment_min_seconds(),
            anchor_similarity_threshold: default_anchor_similarity_threshold(),
        }
    }
}

impl SpConfig {
    /// Load configuration: TOML file if present, then environment
    /// overrides for the service endpoints.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))?
            }
            _ => SpConfig::default(),
        };

        if let Ok(url) = std::env::var("BEREAN_TRANSCRIPTION_URL") {
            config.transcription_url = url;
        }
        if let Ok(url) = std::env::var("BEREAN_GENERATION_URL") {
            config.generation_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.segment_min_seconds <= 0.0 || self.segment_target_seconds <= self.segment_min_seconds
        {
            return Err(Error::Config(format!(
                "segment durations invalid: min {} target {}",
                self.segment_min_seconds, self.segment_target_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.anchor_similarity_threshold) {
            return Err(Error::Config(format!(
                "anchor similarity threshold out of range: {}",
                self.anchor_similarity_threshold
            )));
        }
        Ok(())
    }

    /// Job deadline as a Duration
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    /// Poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpConfig::default();
        assert_eq!(config.segment_target_seconds, 12.0);
        assert_eq!(config.segment_min_seconds, 5.0);
        assert_eq!(config.anchor_similarity_threshold, 0.80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SpConfig = toml::from_str("job_timeout_seconds = 120").unwrap();
        assert_eq!(config.job_timeout_seconds, 120);
        assert_eq!(config.segment_target_seconds, 12.0);
    }

    #[test]
    fn test_invalid_durations_rejected() {
        let config: SpConfig =
            toml::from_str("segment_target_seconds = 3.0\nsegment_min_seconds = 5.0").unwrap();
        assert!(config.validate().is_err());
    }
}
