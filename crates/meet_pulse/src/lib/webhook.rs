use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use meet_datastore::{BotStatus, DataStore};
use serde_json::Value;

use crate::{
    dispatch::{EvaluationDispatcher, EvaluationJob},
    transcript::{TranscriptBuffer, TranscriptSegment},
};

/// Provider webhooks normalized into a single tagged shape at the
/// boundary. The provider has shipped several payload layouts over time
/// (`data.bot_id` vs `data.bot.id`, transcript word arrays vs flat
/// text); everything downstream only ever sees this enum.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Lifecycle {
        bot_id: String,
        code: String,
        message: Option<String>,
    },
    Transcript {
        bot_id: String,
        segment: TranscriptSegment,
    },
}

impl ProviderEvent {
    /// Returns `None` for payloads with no recognizable bot id or body;
    /// the caller logs and acknowledges those without erroring.
    pub fn normalize(payload: &Value) -> Option<ProviderEvent> {
        let data = payload.get("data")?;

        let bot_id = data
            .get("bot_id")
            .and_then(Value::as_str)
            .or_else(|| {
                data.get("bot")
                    .and_then(|bot| bot.get("id"))
                    .and_then(Value::as_str)
            })?
            .to_string();

        if let Some(transcript) = data.get("transcript") {
            let speaker = transcript
                .get("speaker")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();

            let (text, timestamp) = match transcript.get("words").and_then(Value::as_array) {
                Some(words) => {
                    let text = words
                        .iter()
                        .filter_map(|w| w.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let timestamp = words
                        .first()
                        .and_then(|w| w.get("start_timestamp"))
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                    (text, timestamp)
                }
                None => (
                    transcript
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    transcript
                        .get("timestamp")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                ),
            };

            let is_partial = transcript
                .get("is_final")
                .and_then(Value::as_bool)
                .map(|is_final| !is_final)
                .or_else(|| transcript.get("is_partial").and_then(Value::as_bool))
                .unwrap_or(false);

            return Some(ProviderEvent::Transcript {
                bot_id,
                segment: TranscriptSegment {
                    speaker,
                    text,
                    timestamp,
                    is_partial,
                },
            });
        }

        let status = data.get("status")?;
        let code = status
            .get("code")
            .and_then(Value::as_str)
            .or_else(|| status.as_str())?
            .to_string();
        let message = status
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(ProviderEvent::Lifecycle {
            bot_id,
            code,
            message,
        })
    }
}

/// Fixed mapping from provider status codes to the internal state
/// machine. Deliberately a pure lookup with no state comparison, so
/// redelivered events are safe by construction.
pub fn map_status_code(code: &str) -> Option<BotStatus> {
    match code {
        "ready" => Some(BotStatus::Created),
        "joining_call" | "in_waiting_room" | "in_call_not_recording" => Some(BotStatus::Joining),
        "in_call_recording" => Some(BotStatus::Recording),
        "call_ended" | "done" | "analysis_done" => Some(BotStatus::Processing),
        "fatal" => Some(BotStatus::Error),
        _ => None,
    }
}

/// Codes after which the provider will send nothing further of value;
/// they trigger the one-time evaluation dispatch. `fatal` is not one of
/// them.
pub fn is_finishing_code(code: &str) -> bool {
    matches!(code, "done" | "analysis_done")
}

/// Process-wide set of bot ids whose evaluation has been dispatched.
/// Entries are released after a TTL to bound memory, which is also the
/// window within which duplicate webhook deliveries are deduplicated.
/// Single-instance only; a multi-instance deployment would need to swap
/// in a shared store behind this same surface.
#[derive(Debug, Clone, Default)]
pub struct DispatchGuard {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl DispatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert. Returns true when this caller won the dispatch.
    pub fn mark_dispatched(&self, bot_id: &str) -> bool {
        let mut set = self.inner.lock().expect("dispatch guard lock poisoned");
        set.insert(bot_id.to_string())
    }

    pub fn is_dispatched(&self, bot_id: &str) -> bool {
        let set = self.inner.lock().expect("dispatch guard lock poisoned");
        set.contains(bot_id)
    }

    pub fn release(&self, bot_id: &str) {
        let mut set = self.inner.lock().expect("dispatch guard lock poisoned");
        set.remove(bot_id);
    }
}

/// Advances the persisted bot state machine from provider webhooks and
/// routes transcript events into the live buffer.
///
/// Deliveries are at-least-once and unordered; an out-of-order earlier
/// state simply overwrites a later one, an accepted inconsistency
/// window. Processing never fails outward so the HTTP handler can
/// always acknowledge.
#[derive(Debug, Clone)]
pub struct WebhookProcessor<D, E> {
    store: D,
    transcripts: TranscriptBuffer,
    guard: DispatchGuard,
    dispatcher: E,
    dedup_ttl: Duration,
}

impl<D, E> WebhookProcessor<D, E>
where
    D: DataStore + Send + Sync + 'static,
    E: EvaluationDispatcher + Send + Sync + 'static,
{
    const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(10 * 60);

    pub fn new(store: D, transcripts: TranscriptBuffer, dispatcher: E) -> Self {
        Self {
            store,
            transcripts,
            guard: DispatchGuard::new(),
            dispatcher,
            dedup_ttl: Self::DEFAULT_DEDUP_TTL,
        }
    }

    pub fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    pub fn transcripts(&self) -> &TranscriptBuffer {
        &self.transcripts
    }

    #[tracing::instrument(skip_all)]
    pub async fn process(&self, payload: &Value) {
        match ProviderEvent::normalize(payload) {
            None => {
                tracing::warn!("Ignoring malformed webhook payload");
            }
            Some(ProviderEvent::Transcript { bot_id, segment }) => {
                self.transcripts.apply(&bot_id, segment);
            }
            Some(ProviderEvent::Lifecycle {
                bot_id,
                code,
                message,
            }) => {
                if let Err(e) = self
                    .apply_lifecycle(&bot_id, &code, message.as_deref())
                    .await
                {
                    tracing::error!(error = ?e, %bot_id, "Failed to process lifecycle event");
                }
            }
        }
    }

    async fn apply_lifecycle(
        &self,
        bot_id: &str,
        code: &str,
        message: Option<&str>,
    ) -> anyhow::Result<()> {
        let Some(status) = map_status_code(code) else {
            tracing::debug!(%code, %bot_id, "Ignoring unrecognized status code");
            return Ok(());
        };

        let error_message = match status {
            BotStatus::Error => Some(message.unwrap_or("Bot reported a fatal error")),
            _ => None,
        };

        tracing::info!(%bot_id, %code, status = status.as_str(), "Bot status transition");

        self.store
            .upsert_bot_session(bot_id, status, error_message)
            .await?;

        // the session record is authoritative, mirror failures are benign
        if let Err(e) = self
            .store
            .mirror_scheduled_status(bot_id, status, error_message)
            .await
        {
            tracing::warn!(error = ?e, %bot_id, "Failed to mirror status onto scheduled bot");
        }

        if is_finishing_code(code) {
            self.dispatch_evaluation(bot_id).await;
        }

        Ok(())
    }

    async fn dispatch_evaluation(&self, bot_id: &str) {
        if !self.guard.mark_dispatched(bot_id) {
            tracing::debug!(%bot_id, "Evaluation already dispatched, skipping duplicate");
            return;
        }

        let guard = self.guard.clone();
        let released_bot = bot_id.to_string();
        let ttl = self.dedup_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            guard.release(&released_bot);
        });

        let evaluation_id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self.store.link_evaluation(bot_id, &evaluation_id).await {
            tracing::warn!(error = ?e, %bot_id, "Failed to link evaluation id");
        }

        // lifecycle state is already persisted and must not be rolled
        // back if the evaluation handoff fails
        if let Err(e) = self
            .dispatcher
            .dispatch(EvaluationJob {
                bot_id: bot_id.to_string(),
                evaluation_id,
            })
            .await
        {
            tracing::error!(error = ?e, %bot_id, "Failed to dispatch evaluation");
        }
    }
}
