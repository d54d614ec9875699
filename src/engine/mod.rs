/// Automation engine boundary.
///
/// The engine is the external service that actually drives a browser
/// against the target URL. agent-trail only needs one operation from it:
/// run an agent and report the terminal outcome. The production
/// implementation (`SseEngine`) consumes the engine's server-sent event
/// stream; tests use `MockEngine`.
pub mod mock;
pub mod sse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use mock::MockEngine;
pub use sse::SseEngine;

/// Configuration for the automation engine endpoint.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Full URL of the engine's SSE run endpoint.
    pub base_url: String,
    /// API key sent as `X-API-Key`.
    pub api_key: String,
}

/// Terminal outcome of a completed agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Engine-assigned run identifier.
    pub run_id: Option<String>,
    /// Live-view URL announced mid-run, if the engine offers one. Not
    /// persisted; returned to the caller and then gone.
    pub streaming_url: Option<String>,
    /// URL the agent actually ended on.
    pub final_url: String,
    /// Engine-reported completion timestamp, kept verbatim.
    pub timestamp: String,
    /// Structured result payload; an empty object when the engine
    /// reported none.
    pub result_json: Value,
}

/// Trait for the browser automation engine that performs agent runs.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Engine name, for logs.
    fn name(&self) -> &str;

    /// Run an agent against `url` pursuing `goal`, blocking until the
    /// run reaches a terminal state.
    async fn run(&self, goal: &str, url: &str) -> Result<RunOutcome>;
}
