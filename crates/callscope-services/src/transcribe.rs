//! Transcription submission client
//!
//! The speech-to-text vendor is an external collaborator; this client only
//! submits downloaded recordings and returns the vendor's job id. Result
//! retrieval happens out of band (the vendor calls back or is polled by a
//! separate consumer) and is not part of this service.

use async_trait::async_trait;
use bytes::Bytes;
use callscope_core::config::TranscriptionConfig;
use callscope_core::models::CallRecord;
use callscope_core::traits::Transcriber;
use callscope_core::{AppError, AppResult};
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Submission request timeout in seconds
const SUBMIT_TIMEOUT_SECS: u64 = 60;

/// HTTP transcription client
pub struct HttpTranscriber {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranscriber {
    pub fn new(config: &TranscriptionConfig) -> AppResult<Self> {
        let http_client = ClientBuilder::new()
            .timeout(Duration::from_secs(SUBMIT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    #[instrument(skip(self, audio), fields(call_id = %record.id, bytes = audio.len()))]
    async fn submit(&self, record: &CallRecord, audio: Bytes) -> AppResult<String> {
        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "audio/mpeg")
            .header("X-Call-Id", record.id.clone())
            .body(audio);

        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Transcription(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transcription(format!(
                "submission rejected with status {}",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Transcription(format!("unreadable response: {}", e)))?;

        let job_id = body
            .get("job_id")
            .or_else(|| body.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::Transcription("response carried no job id".to_string())
            })?;

        debug!("Transcription job {} accepted", job_id);
        Ok(job_id.to_string())
    }
}

/// No-op transcriber used when transcription is disabled
///
/// Accepts every submission without doing anything, so the sync pipeline
/// behaves identically with transcription switched off.
pub struct NoopTranscriber;

#[async_trait]
impl Transcriber for NoopTranscriber {
    async fn submit(&self, record: &CallRecord, _audio: Bytes) -> AppResult<String> {
        debug!("Transcription disabled, dropping audio for {}", record.id);
        Ok(format!("disabled-{}", record.id))
    }
}
