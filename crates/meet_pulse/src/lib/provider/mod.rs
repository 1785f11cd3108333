pub mod recall;

use std::{fmt::Debug, future::Future};

use crate::transcript::TranscriptSegment;

/// What to tell the provider when requesting a bot: where the meeting
/// is, where to send webhooks, how to transcribe, and when to give up
/// on an empty call.
#[derive(Debug, Clone)]
pub struct BotRequest {
    pub meeting_url: String,
    pub bot_name: String,
    pub webhook_url: String,
    pub transcription_language: String,
    pub transcription_model: String,
    /// Seconds to wait in the lobby before leaving.
    pub waiting_room_timeout_secs: u32,
    /// Seconds alone in the call before leaving.
    pub everyone_left_timeout_secs: u32,
}

impl BotRequest {
    pub fn new(meeting_url: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            meeting_url: meeting_url.into(),
            bot_name: "Meeting Notetaker".into(),
            webhook_url: webhook_url.into(),
            transcription_language: "en".into(),
            transcription_model: "whisper".into(),
            waiting_room_timeout_secs: 1200,
            everyone_left_timeout_secs: 120,
        }
    }
}

pub trait BotProvider {
    type Error: Debug;

    /// Requests a recording bot for a meeting. Returns the provider's
    /// bot id.
    fn create_bot(
        &self,
        request: &BotRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// One-shot fetch of the full transcript the provider holds for a
    /// bot. Used as the poll fallback when the live buffer is empty.
    fn fetch_transcript(
        &self,
        bot_id: &str,
    ) -> impl Future<Output = Result<Vec<TranscriptSegment>, Self::Error>> + Send;
}
