use std::sync::{Arc, Mutex};

use meet_pulse::{BotProvider, BotRequest, TranscriptSegment};

#[derive(Clone, Default)]
pub struct MockBotProvider {
    pub created: Arc<Mutex<Vec<BotRequest>>>,
    pub transcript: Arc<Mutex<Vec<TranscriptSegment>>>,
    pub fetch_calls: Arc<Mutex<usize>>,
    pub fail_with: Option<String>,
}

impl MockBotProvider {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn with_transcript(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            transcript: Arc::new(Mutex::new(segments)),
            ..Default::default()
        }
    }
}

impl BotProvider for MockBotProvider {
    type Error = anyhow::Error;

    async fn create_bot(&self, request: &BotRequest) -> anyhow::Result<String> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(format!("bot-{}", created.len()))
    }

    async fn fetch_transcript(&self, _bot_id: &str) -> anyhow::Result<Vec<TranscriptSegment>> {
        *self.fetch_calls.lock().unwrap() += 1;
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        Ok(self.transcript.lock().unwrap().clone())
    }
}
