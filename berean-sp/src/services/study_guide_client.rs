//! Remote study guide generation client
//!
//! Submits the corrected transcript text to the generation service and
//! polls for the structured study guide payload. The payload's field set
//! is a versioned wire format; decoding tolerates legacy versions (see
//! `StudyGuideWire`).

use crate::error::ProcessingError;
use crate::models::study_guide::StudyGuideWire;
use crate::types::{GenerationRequest, StudyGuideService};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "Berean/0.1.0 (sermon processing)";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Service returned an error response
    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    /// Failed to parse service response JSON
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The job itself reported failure
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// The service flagged the transcript content
    #[error("Content flagged: {0}")]
    ContentFlagged(String),
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// HTTP client for the remote study guide generation job
pub struct StudyGuideClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl StudyGuideClient {
    pub fn new(base_url: String, poll_interval: Duration) -> Result<Self, GenerationClientError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerationClientError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            poll_interval,
        })
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<String, GenerationClientError> {
        let url = format!("{}/v1/study-guides", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationClientError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::ApiError(status.as_u16(), body));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| GenerationClientError::ParseError(e.to_string()))?;
        Ok(submitted.job_id)
    }

    async fn wait_for_result(&self, job_id: &str) -> Result<StudyGuideWire, GenerationClientError> {
        let url = format!("{}/v1/study-guides/{}", self.base_url, job_id);
        loop {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| GenerationClientError::NetworkError(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationClientError::ApiError(status.as_u16(), body));
            }

            let job: StatusResponse = response
                .json()
                .await
                .map_err(|e| GenerationClientError::ParseError(e.to_string()))?;

            match job.status.as_str() {
                "succeeded" => {
                    let result = job.result.ok_or_else(|| {
                        GenerationClientError::ParseError(
                            "succeeded job carried no result".to_string(),
                        )
                    })?;
                    // Versioned decode: v1 payloads are accepted here and
                    // migrated by the caller
                    return StudyGuideWire::from_json(&result)
                        .map_err(|e| GenerationClientError::ParseError(e.to_string()));
                }
                "failed" => {
                    return Err(GenerationClientError::JobFailed(
                        job.error.unwrap_or_else(|| "unspecified".to_string()),
                    ));
                }
                "moderated" => {
                    return Err(GenerationClientError::ContentFlagged(
                        job.error.unwrap_or_else(|| "content flagged".to_string()),
                    ));
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

#[async_trait::async_trait]
impl StudyGuideService for StudyGuideClient {
    async fn generate(&self, request: GenerationRequest) -> Result<StudyGuideWire, ProcessingError> {
        tracing::info!(
            sermon_id = %request.sermon_id,
            transcript_chars = request.transcript_text.len(),
            "Submitting study guide generation job"
        );

        let job_id = self.submit(&request).await.map_err(map_error)?;
        tracing::debug!(sermon_id = %request.sermon_id, job_id = %job_id, "Generation job accepted");

        let wire = self.wait_for_result(&job_id).await.map_err(map_error)?;
        tracing::info!(sermon_id = %request.sermon_id, "Study guide generation completed");
        Ok(wire)
    }
}

fn map_error(e: GenerationClientError) -> ProcessingError {
    match e {
        GenerationClientError::NetworkError(msg) => ProcessingError::Network(msg),
        GenerationClientError::ApiError(code, msg) => {
            ProcessingError::StudyGuideFailed(format!("service returned {}: {}", code, msg))
        }
        GenerationClientError::ParseError(msg) => {
            ProcessingError::StudyGuideFailed(format!("malformed response: {}", msg))
        }
        GenerationClientError::JobFailed(msg) => ProcessingError::StudyGuideFailed(msg),
        GenerationClientError::ContentFlagged(msg) => ProcessingError::ContentModerated(msg),
    }
}
