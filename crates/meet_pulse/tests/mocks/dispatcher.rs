use std::sync::{Arc, Mutex};

use meet_pulse::{EvaluationDispatcher, EvaluationJob};

#[derive(Clone, Default)]
pub struct MockDispatcher {
    pub jobs: Arc<Mutex<Vec<EvaluationJob>>>,
    pub fail_with: Option<String>,
}

impl MockDispatcher {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl EvaluationDispatcher for MockDispatcher {
    async fn dispatch(&self, job: EvaluationJob) -> anyhow::Result<()> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
