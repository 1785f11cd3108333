use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_retry_after::RetryAfterMiddleware;
use serde::Deserialize;

use crate::{provider::BotRequest, transcript::TranscriptSegment, BotProvider};

#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Recall.ai client. The provider rate-limits aggressively, so every
/// request goes through a Retry-After aware middleware stack with
/// exponential backoff on transient failures.
pub struct RecallClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl RecallClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            api_key: api_key.into(),
            base_url: "https://us-east-1.recall.ai".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct CreateBotResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptUtterance {
    speaker: Option<String>,
    #[serde(default)]
    words: Vec<TranscriptWord>,
}

#[derive(Debug, Deserialize)]
struct TranscriptWord {
    text: String,
    start_timestamp: Option<f64>,
}

impl BotProvider for RecallClient {
    type Error = RecallError;

    async fn create_bot(&self, request: &BotRequest) -> Result<String, RecallError> {
        let body = serde_json::json!({
            "meeting_url": request.meeting_url,
            "bot_name": request.bot_name,
            "webhook_url": request.webhook_url,
            "transcription_options": {
                "language": request.transcription_language,
                "model": request.transcription_model,
            },
            "automatic_leave": {
                "waiting_room_timeout": request.waiting_room_timeout_secs,
                "everyone_left_timeout": request.everyone_left_timeout_secs,
            },
        });

        let resp = self
            .client
            .post(format!("{}/api/v1/bot", self.base_url))
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make create bot request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(RecallError::Api { status, message });
        }

        let bot = resp.json::<CreateBotResponse>().await?;

        Ok(bot.id)
    }

    async fn fetch_transcript(&self, bot_id: &str) -> Result<Vec<TranscriptSegment>, RecallError> {
        let resp = self
            .client
            .get(format!("{}/api/v1/bot/{}/transcript", self.base_url, bot_id))
            .header("Authorization", format!("Token {}", self.api_key))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to fetch transcript"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(RecallError::Api { status, message });
        }

        let utterances = resp.json::<Vec<TranscriptUtterance>>().await?;

        let segments = utterances
            .into_iter()
            .filter(|u| !u.words.is_empty())
            .map(|u| TranscriptSegment {
                speaker: u.speaker.unwrap_or_else(|| "Unknown".into()),
                timestamp: u.words.first().and_then(|w| w.start_timestamp).unwrap_or(0.0),
                text: u.words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" "),
                is_partial: false,
            })
            .collect();

        Ok(segments)
    }
}
