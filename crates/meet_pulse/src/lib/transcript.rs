use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

/// One utterance (or the in-flight prefix of one) from a single speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker: String,
    pub text: String,
    /// Seconds from the start of the recording.
    pub timestamp: f64,
    pub is_partial: bool,
}

#[derive(Debug)]
struct BotTranscript {
    segments: Vec<TranscriptSegment>,
    last_update: Instant,
}

/// Process-local live transcript store, keyed by provider bot id.
///
/// Providers keep amending the current utterance by re-sending it as a
/// partial segment; `apply` collapses those in place so the segment list
/// only ever grows by finalized speaker turns plus at most one trailing
/// partial. Entries are evicted by age, not by read activity, so bots
/// that never send a terminating event still get cleaned up.
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    inner: Arc<RwLock<HashMap<String, BotTranscript>>>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment, or replaces the trailing segment when it is a
    /// still-partial utterance from the same speaker. A final incoming
    /// segment replaces a trailing partial the same way, finalizing it.
    pub fn apply(&self, bot_id: &str, segment: TranscriptSegment) {
        let mut map = self.inner.write().expect("transcript buffer lock poisoned");
        let entry = map.entry(bot_id.to_string()).or_insert_with(|| BotTranscript {
            segments: Vec::new(),
            last_update: Instant::now(),
        });

        match entry.segments.last_mut() {
            Some(last) if last.is_partial && last.speaker == segment.speaker => *last = segment,
            _ => entry.segments.push(segment),
        }
        entry.last_update = Instant::now();
    }

    /// Current ordered segment list for a bot. Everything except the
    /// very last segment is reported as final, since only the trailing
    /// utterance can still be under revision.
    pub fn read(&self, bot_id: &str) -> Vec<TranscriptSegment> {
        let map = self.inner.read().expect("transcript buffer lock poisoned");
        let Some(entry) = map.get(bot_id) else {
            return Vec::new();
        };

        let mut segments = entry.segments.clone();
        let len = segments.len();
        for segment in segments.iter_mut().take(len.saturating_sub(1)) {
            segment.is_partial = false;
        }
        segments
    }

    pub fn evict(&self, bot_id: &str) {
        let mut map = self.inner.write().expect("transcript buffer lock poisoned");
        map.remove(bot_id);
    }

    /// Drops every entry whose last update is older than `max_age`.
    /// Returns the number of evicted bots.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut map = self.inner.write().expect("transcript buffer lock poisoned");
        let before = map.len();
        map.retain(|_, entry| entry.last_update.elapsed() < max_age);
        before - map.len()
    }

    /// Background eviction task. Runs until the returned handle is
    /// aborted or the runtime shuts down.
    pub fn spawn_sweeper(&self, period: Duration, max_age: Duration) -> tokio::task::JoinHandle<()> {
        let buffer = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = buffer.sweep(max_age);
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted stale transcript buffers");
                }
            }
        })
    }
}
