use std::future::Future;

use tokio::sync::mpsc;

/// Handoff payload for the downstream evaluation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationJob {
    pub bot_id: String,
    pub evaluation_id: String,
}

/// Seam between the webhook processor and whatever runs post-meeting
/// evaluation. Dispatch failures must never affect bot lifecycle state.
pub trait EvaluationDispatcher {
    fn dispatch(&self, job: EvaluationJob) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Dispatcher backed by a bounded channel. The receiving half is owned
/// by a worker task (or an external consumer), keeping evaluation
/// failures observable and retryable outside the webhook response path.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<EvaluationJob>,
}

impl ChannelDispatcher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EvaluationJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EvaluationDispatcher for ChannelDispatcher {
    async fn dispatch(&self, job: EvaluationJob) -> anyhow::Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|e| anyhow::anyhow!("evaluation queue closed: {e}"))
    }
}
