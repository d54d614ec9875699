/// Scriptable engine for tests.
use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use super::{AutomationEngine, RunOutcome};
use crate::error::{Result, TrailError};

/// Behavior of the next `run` call.
#[derive(Debug, Clone)]
pub enum RunPlan {
    Succeed(RunOutcome),
    Fail(String),
}

#[derive(Default)]
pub struct MockEngine {
    plans: Mutex<VecDeque<RunPlan>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plan for an upcoming `run` call. With no plan queued, a
    /// run succeeds with an empty result ending on the requested URL.
    pub async fn plan(&self, plan: RunPlan) {
        self.plans.lock().await.push_back(plan);
    }
}

#[async_trait]
impl AutomationEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, _goal: &str, url: &str) -> Result<RunOutcome> {
        let plan = self.plans.lock().await.pop_front();

        match plan {
            Some(RunPlan::Succeed(outcome)) => Ok(outcome),
            Some(RunPlan::Fail(msg)) => Err(TrailError::Engine(msg)),
            None => Ok(RunOutcome {
                run_id: Some("run-mock".to_string()),
                streaming_url: None,
                final_url: url.to_string(),
                timestamp: "2024-01-01T00:00:00Z".to_string(),
                result_json: json!({}),
            }),
        }
    }
}
