/// SSE client for the automation engine.
///
/// The engine streams progress as server-sent events. Only two event
/// types are terminal: a COMPLETE with status COMPLETED resolves the
/// run, and an ERROR fails it. STARTED and STREAMING_URL contribute
/// fields to the eventual outcome; PROGRESS is ignored. A stream that
/// ends without a terminal event is a failure: the run's outcome is
/// unknown.
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AutomationEngine, EngineConfig, RunOutcome};
use crate::error::{Result, TrailError};

pub struct SseEngine {
    config: EngineConfig,
    client: Client,
}

impl SseEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

/// One event from the engine stream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SseEvent {
    #[serde(rename = "type")]
    kind: String,
    run_id: Option<String>,
    timestamp: Option<String>,
    status: Option<String>,
    streaming_url: Option<String>,
    result_json: Option<Value>,
    error: Option<String>,
}

/// Fields accumulated from non-terminal events.
#[derive(Default)]
struct StreamState {
    run_id: Option<String>,
    streaming_url: Option<String>,
}

/// Splits a byte stream into complete `data:` payloads.
///
/// SSE frames are newline-delimited and chunk boundaries fall anywhere,
/// so partial lines are buffered until their newline arrives.
#[derive(Default)]
struct SseLineBuffer {
    buf: String,
}

impl SseLineBuffer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Interpret one event payload. Returns the outcome if the event was
/// terminal, None to keep reading.
fn apply_event(
    payload: &str,
    request_url: &str,
    state: &mut StreamState,
) -> Result<Option<RunOutcome>> {
    let event: SseEvent = serde_json::from_str(payload)
        .map_err(|e| TrailError::Engine(format!("failed to parse engine event: {e}")))?;

    match event.kind.as_str() {
        "STARTED" => {
            state.run_id = event.run_id;
            Ok(None)
        }
        "STREAMING_URL" => {
            if let Some(url) = event.streaming_url.filter(|u| !u.is_empty()) {
                state.streaming_url = Some(url);
            }
            Ok(None)
        }
        "COMPLETE" if event.status.as_deref() == Some("COMPLETED") => {
            let timestamp = event
                .timestamp
                .ok_or_else(|| TrailError::Engine("completion event missing timestamp".into()))?;
            let result_json = event.result_json.unwrap_or_else(|| json!({}));
            let final_url = result_json
                .get("url")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(request_url)
                .to_string();

            Ok(Some(RunOutcome {
                run_id: state.run_id.take().or(event.run_id),
                streaming_url: state.streaming_url.take(),
                final_url,
                timestamp,
                result_json,
            }))
        }
        "ERROR" => Err(TrailError::Engine(
            event.error.unwrap_or_else(|| "engine execution failed".into()),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl AutomationEngine for SseEngine {
    fn name(&self) -> &str {
        "sse"
    }

    async fn run(&self, goal: &str, url: &str) -> Result<RunOutcome> {
        let response = self
            .client
            .post(&self.config.base_url)
            .header("X-API-Key", &self.config.api_key)
            .json(&json!({ "goal": goal, "url": url }))
            .send()
            .await
            .map_err(|e| TrailError::Engine(format!("engine request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TrailError::Engine(format!(
                "engine returned {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut state = StreamState::default();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| TrailError::Engine(format!("engine stream failed: {e}")))?;
            for payload in lines.feed(&chunk) {
                if let Some(outcome) = apply_event(&payload, url, &mut state)? {
                    return Ok(outcome);
                }
            }
        }

        Err(TrailError::Engine(
            "engine stream ended without completing".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_handles_split_chunks() {
        let mut buf = SseLineBuffer::default();

        assert!(buf.feed(b"data: {\"type\":").is_empty());
        let payloads = buf.feed(b"\"PROGRESS\"}\n");
        assert_eq!(payloads, vec![r#"{"type":"PROGRESS"}"#]);
    }

    #[test]
    fn test_line_buffer_handles_multiple_events_per_chunk() {
        let mut buf = SseLineBuffer::default();
        let payloads = buf.feed(b"data: one\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[test]
    fn test_line_buffer_strips_crlf_and_ignores_other_fields() {
        let mut buf = SseLineBuffer::default();
        let payloads = buf.feed(b"event: message\r\nid: 7\r\ndata: payload\r\n\r\n");
        assert_eq!(payloads, vec!["payload"]);
    }

    #[test]
    fn test_progress_events_are_skipped() {
        let mut state = StreamState::default();
        let result = apply_event(
            r#"{"type":"PROGRESS","runId":"r1","timestamp":"t","purpose":"scrolling"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_complete_resolves_with_run_id_from_started() {
        let mut state = StreamState::default();

        apply_event(
            r#"{"type":"STARTED","runId":"run-42","timestamp":"t0"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap();

        let outcome = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","timestamp":"2024-01-01T00:00:00Z","resultJson":{"price":"10"}}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap()
        .unwrap();

        assert_eq!(outcome.run_id.as_deref(), Some("run-42"));
        assert_eq!(outcome.timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(outcome.result_json["price"], "10");
    }

    #[test]
    fn test_streaming_url_carried_into_outcome() {
        let mut state = StreamState::default();

        apply_event(
            r#"{"type":"STREAMING_URL","streamingUrl":"https://live.example/watch/9"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap();

        let outcome = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","timestamp":"t"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            outcome.streaming_url.as_deref(),
            Some("https://live.example/watch/9")
        );
    }

    #[test]
    fn test_empty_streaming_url_is_ignored() {
        let mut state = StreamState::default();

        apply_event(
            r#"{"type":"STREAMING_URL","streamingUrl":""}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap();

        let outcome = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","timestamp":"t"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap()
        .unwrap();

        assert!(outcome.streaming_url.is_none());
    }

    #[test]
    fn test_final_url_prefers_result_url() {
        let mut state = StreamState::default();
        let outcome = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","timestamp":"t","resultJson":{"url":"https://example.com/checkout"}}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap()
        .unwrap();
        assert_eq!(outcome.final_url, "https://example.com/checkout");
    }

    #[test]
    fn test_final_url_falls_back_on_missing_or_empty() {
        let mut state = StreamState::default();
        let outcome = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","timestamp":"t","resultJson":{"url":""}}"#,
            "https://example.com/start",
            &mut state,
        )
        .unwrap()
        .unwrap();
        assert_eq!(outcome.final_url, "https://example.com/start");
    }

    #[test]
    fn test_complete_without_completed_status_keeps_reading() {
        let mut state = StreamState::default();
        let result = apply_event(
            r#"{"type":"COMPLETE","status":"PARTIAL","timestamp":"t"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_error_event_fails_the_run() {
        let mut state = StreamState::default();
        let err = apply_event(
            r#"{"type":"ERROR","error":"navigation blocked"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap_err();
        assert!(matches!(err, TrailError::Engine(ref msg) if msg == "navigation blocked"));
    }

    #[test]
    fn test_missing_result_defaults_to_empty_object() {
        let mut state = StreamState::default();
        let outcome = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","timestamp":"t"}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap()
        .unwrap();
        assert_eq!(outcome.result_json, json!({}));
    }

    #[test]
    fn test_unparseable_event_is_an_engine_error() {
        let mut state = StreamState::default();
        let err = apply_event("not json", "https://example.com", &mut state).unwrap_err();
        assert!(matches!(err, TrailError::Engine(_)));
    }

    #[test]
    fn test_completion_without_timestamp_is_rejected() {
        let mut state = StreamState::default();
        let err = apply_event(
            r#"{"type":"COMPLETE","status":"COMPLETED","resultJson":{}}"#,
            "https://example.com",
            &mut state,
        )
        .unwrap_err();
        assert!(matches!(err, TrailError::Engine(_)));
    }
}
