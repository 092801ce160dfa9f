//! Remote transcription service client
//!
//! The transcription service is an opaque asynchronous job: submit the
//! uploaded chunk locations, poll until the job reaches a terminal
//! state, and decode the structured word-timing output. The caller owns
//! the overall deadline; this client never blocks without its per-request
//! timeout.

use crate::error::ProcessingError;
use crate::types::{TranscriptPayload, TranscriptionRequest, TranscriptionService};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "Berean/0.1.0 (sermon processing)";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transcription client errors
#[derive(Debug, Error)]
pub enum TranscriptionClientError {
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

    /// The service flagged the audio content and declined to transcribe
    #[error("Content flagged: {0}")]
    ContentFlagged(String),
}

/// Job submission response
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Job status response
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<TranscriptPayload>,
}

/// HTTP client for the remote transcription job
pub struct TranscriptionClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl TranscriptionClient {
    pub fn new(base_url: String, poll_interval: Duration) -> Result<Self, TranscriptionClientError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscriptionClientError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            poll_interval,
        })
    }

    /// Submit the job, returning its id
    async fn submit(&self, request: &TranscriptionRequest) -> Result<String, TranscriptionClientError> {
        let url = format!("{}/v1/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TranscriptionClientError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionClientError::ApiError(status.as_u16(), body));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionClientError::ParseError(e.to_string()))?;
        Ok(submitted.job_id)
    }

    /// Poll the job until it reaches a terminal state
    async fn wait_for_result(&self, job_id: &str) -> Result<TranscriptPayload, TranscriptionClientError> {
        let url = format!("{}/v1/transcriptions/{}", self.base_url, job_id);
        loop {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| TranscriptionClientError::NetworkError(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TranscriptionClientError::ApiError(status.as_u16(), body));
            }

            let job: StatusResponse = response
                .json()
                .await
                .map_err(|e| TranscriptionClientError::ParseError(e.to_string()))?;

            match job.status.as_str() {
                "succeeded" => {
                    return job.result.ok_or_else(|| {
                        TranscriptionClientError::ParseError(
                            "succeeded job carried no result".to_string(),
                        )
                    });
                }
                "failed" => {
                    return Err(TranscriptionClientError::JobFailed(
                        job.error.unwrap_or_else(|| "unspecified".to_string()),
                    ));
                }
                "moderated" => {
                    return Err(TranscriptionClientError::ContentFlagged(
                        job.error.unwrap_or_else(|| "content flagged".to_string()),
                    ));
                }
                // pending / running
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

#[async_trait::async_trait]
impl TranscriptionService for TranscriptionClient {
    async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptPayload, ProcessingError> {
        tracing::info!(
            sermon_id = %request.sermon_id,
            chunk_count = request.chunk_urls.len(),
            "Submitting transcription job"
        );

        let job_id = self.submit(&request).await.map_err(map_error)?;
        tracing::debug!(sermon_id = %request.sermon_id, job_id = %job_id, "Transcription job accepted");

        let payload = self.wait_for_result(&job_id).await.map_err(map_error)?;
        tracing::info!(
            sermon_id = %request.sermon_id,
            word_count = payload.words.len(),
            "Transcription job completed"
        );
        Ok(payload)
    }
}

/// Classify client errors into the processing taxonomy
fn map_error(e: TranscriptionClientError) -> ProcessingError {
    match e {
        TranscriptionClientError::NetworkError(msg) => ProcessingError::Network(msg),
        TranscriptionClientError::ApiError(code, msg) => {
            ProcessingError::TranscriptionFailed(format!("service returned {}: {}", code, msg))
        }
        TranscriptionClientError::ParseError(msg) => {
            ProcessingError::TranscriptionFailed(format!("malformed response: {}", msg))
        }
        TranscriptionClientError::JobFailed(msg) => ProcessingError::TranscriptionFailed(msg),
        TranscriptionClientError::ContentFlagged(msg) => ProcessingError::ContentModerated(msg),
    }
}
