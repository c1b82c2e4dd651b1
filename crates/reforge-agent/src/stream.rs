//! Cancellable consumption of streamed agent events
//!
//! The Codex runtime emits one JSON event per line. The consumer loop
//! below polls the stream while watching the cancellation token; on
//! cancellation it invokes the producer's `stop` capability and only then
//! reports, so stream cleanup is guaranteed to have run.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::port::AgentRunResult;

/// Error payload of a failed turn
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TurnError {
    pub message: String,
}

/// One streamed event from the agent runtime
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ThreadEvent {
    #[serde(rename = "item.started")]
    ItemStarted { item: serde_json::Value },
    #[serde(rename = "item.updated")]
    ItemUpdated { item: serde_json::Value },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: serde_json::Value },
    /// The defined end-of-turn signal; a stream that ends without one is a
    /// truncated stream
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<serde_json::Value>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: TurnError },
    #[serde(rename = "error")]
    StreamError {
        #[serde(default)]
        message: Option<String>,
    },
    /// Unknown event kinds and unparseable lines are carried verbatim
    #[serde(skip)]
    Other { raw: String },
}

/// Parse one stream line; anything unrecognized becomes `Other`
pub fn parse_event(line: &str) -> ThreadEvent {
    serde_json::from_str(line).unwrap_or_else(|_| ThreadEvent::Other {
        raw: line.to_string(),
    })
}

fn item_kind(item: &serde_json::Value) -> &str {
    item.get("type").and_then(|v| v.as_str()).unwrap_or("unknown")
}

/// Render an event as one log line
pub fn format_event(event: &ThreadEvent) -> String {
    match event {
        ThreadEvent::ItemStarted { item } => {
            format!("[item.started:{}] {}", item_kind(item), item)
        }
        ThreadEvent::ItemUpdated { item } => {
            format!("[item.updated:{}] {}", item_kind(item), item)
        }
        ThreadEvent::ItemCompleted { item } => {
            format!("[item.completed:{}] {}", item_kind(item), item)
        }
        ThreadEvent::TurnCompleted { usage } => match usage {
            Some(usage) => format!("[turn.completed] usage={}", usage),
            None => "[turn.completed] usage=null".to_string(),
        },
        ThreadEvent::TurnFailed { error } => format!("[turn.failed] {}", error.message),
        ThreadEvent::StreamError { message } => {
            format!("[error] {}", message.as_deref().unwrap_or("unknown"))
        }
        ThreadEvent::Other { raw } => format!("[unknown] {}", raw),
    }
}

/// Producer side of a streamed agent run
#[async_trait]
pub trait EventStream: Send {
    /// The next event, or `Ok(None)` when the stream is exhausted
    async fn next_event(&mut self) -> std::io::Result<Option<ThreadEvent>>;

    /// Tear the producer down. Cleanup has completed when this resolves.
    async fn stop(&mut self);
}

/// What a consumed stream ended as
#[derive(Debug, Default)]
pub struct StreamOutcome {
    pub logs: Vec<String>,
    pub turn_completed: bool,
    pub turn_failed: Option<String>,
    pub fault: Option<String>,
    pub cancelled: bool,
}

impl StreamOutcome {
    pub fn joined_logs(&self) -> String {
        self.logs.join("\n")
    }

    /// Map the outcome to the normalized run result. Precedence:
    /// cancellation, failed turn, transport fault, truncated stream,
    /// success.
    pub fn into_result(self) -> AgentRunResult {
        let logs = self.joined_logs();

        if self.cancelled {
            return AgentRunResult::timeout(logs);
        }

        if let Some(message) = self.turn_failed {
            return AgentRunResult::error(logs, "message", message);
        }

        if let Some(message) = self.fault {
            return AgentRunResult::error(logs, "message", message);
        }

        if !self.turn_completed {
            let logs = if logs.is_empty() {
                "agent turn ended without a completion event".to_string()
            } else {
                logs
            };
            return AgentRunResult::error(logs, "reason", "missing-turn-completion");
        }

        AgentRunResult::success(logs)
    }
}

/// Consume a stream to its terminal condition
///
/// Each event is formatted exactly once into the outcome's logs and
/// mirrored to `on_data`. A `turn.failed` event ends consumption early;
/// cancellation stops the producer before returning.
pub async fn consume_stream<S: EventStream>(
    stream: &mut S,
    cancel: &CancellationToken,
    on_data: Option<&UnboundedSender<String>>,
) -> StreamOutcome {
    enum Step {
        Cancelled,
        Next(std::io::Result<Option<ThreadEvent>>),
    }

    let mut outcome = StreamOutcome::default();

    loop {
        let step = tokio::select! {
            _ = cancel.cancelled() => Step::Cancelled,
            next = stream.next_event() => Step::Next(next),
        };

        match step {
            Step::Cancelled => {
                stream.stop().await;
                outcome.cancelled = true;
                break;
            }
            Step::Next(Ok(Some(event))) => {
                let formatted = format_event(&event);
                if let Some(sender) = on_data {
                    let _ = sender.send(format!("{}\n", formatted));
                }
                outcome.logs.push(formatted);

                match event {
                    ThreadEvent::TurnFailed { error } => {
                        outcome.turn_failed = Some(error.message);
                        break;
                    }
                    ThreadEvent::TurnCompleted { .. } => {
                        outcome.turn_completed = true;
                    }
                    _ => {}
                }
            }
            Step::Next(Ok(None)) => break,
            Step::Next(Err(e)) => {
                outcome.logs.push(format!("[error] {}", e));
                outcome.fault = Some(e.to_string());
                break;
            }
        }
    }

    outcome
}
